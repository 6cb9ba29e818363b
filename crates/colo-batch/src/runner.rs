use crate::cancel::SweepCancellation;
use crate::job::{PointStatus, SweepJob, SweepRecord};
use crate::manifest::SweepManifest;
use crate::table::SweepTable;
use anyhow::{Context, Result};
use colo_algo::{run_scenario, DegradedReason, FinanceParams, SolveOptions};
use colo_ts::MarketInputs;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

pub const TABLE_FILE: &str = "sweep_results.csv";
pub const MANIFEST_FILE: &str = "sweep_manifest.json";

/// Everything a sweep needs. All of it is read-only while workers run.
pub struct SweepRunnerConfig {
    pub jobs: Vec<SweepJob>,
    pub inputs: MarketInputs,
    pub finance: FinanceParams,
    pub solve: SolveOptions,
    pub output_root: PathBuf,
    /// Worker count; 0 uses every core.
    pub threads: usize,
    pub cancellation: SweepCancellation,
}

/// Summary returned after the run so callers can report counts and file locations.
pub struct SweepSummary {
    pub table: SweepTable,
    pub table_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Run every job, then write the result table and manifest under
/// `output_root`.
pub fn run_sweep(config: &SweepRunnerConfig) -> Result<SweepSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating sweep output root '{}'",
            config.output_root.display()
        )
    })?;

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let total = config.jobs.len();
    let finished = AtomicUsize::new(0);
    let table = evaluate_jobs_with(config, thread_count, |row| {
        let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            scenario = %row.scenario,
            status = row.status.as_str(),
            done,
            total,
            "sweep point finished"
        );
    })?;

    let table_path = config.output_root.join(TABLE_FILE);
    table.write_csv(&table_path)?;

    let counts = table.counts();
    let manifest = SweepManifest::new(
        &table,
        config.inputs.len(),
        thread_count,
        &config.finance,
        &table_path,
    );
    let manifest_path = config.output_root.join(MANIFEST_FILE);
    manifest.write(&manifest_path)?;

    info!(
        points = table.len(),
        valid = counts.valid,
        degraded = counts.degraded,
        error = counts.error,
        cancelled = counts.cancelled,
        table = %table_path.display(),
        "sweep complete"
    );
    Ok(SweepSummary {
        table,
        table_path,
        manifest_path,
    })
}

/// Evaluate all jobs on a pool of `threads` workers, without touching disk.
///
/// Rows land in a buffer pre-sized to the job list and indexed by job
/// position, so row order never depends on completion order. Slots start out
/// as `cancelled` and are overwritten as points finish.
pub fn evaluate_jobs(config: &SweepRunnerConfig, threads: usize) -> Result<SweepTable> {
    evaluate_jobs_with(config, threads, |_| {})
}

/// [`evaluate_jobs`], calling `on_point` on the worker as each evaluated
/// point's row is ready. Points skipped by cancellation are not reported.
pub fn evaluate_jobs_with<F>(
    config: &SweepRunnerConfig,
    threads: usize,
    on_point: F,
) -> Result<SweepTable>
where
    F: Fn(&SweepRecord) + Sync,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("building Rayon thread pool for sweep")?;

    let mut rows: Vec<SweepRecord> = config
        .jobs
        .iter()
        .map(|job| SweepRecord::cancelled(job, "sweep cancelled before this point started"))
        .collect();

    pool.install(|| {
        rows.par_iter_mut()
            .zip(config.jobs.par_iter())
            .for_each(|(slot, job)| {
                if let Some(row) = run_job(job, config) {
                    on_point(&row);
                    *slot = row;
                }
            });
    });

    Ok(SweepTable::new(rows))
}

/// Evaluate one grid point. Failures stay inside the returned row; `None`
/// when the sweep was cancelled before the point started.
fn run_job(job: &SweepJob, config: &SweepRunnerConfig) -> Option<SweepRecord> {
    let cancellation = &config.cancellation;
    if cancellation.is_cancelled() {
        info!(scenario = %job.scenario.name, "sweep cancelled before point started");
        return None;
    }

    let mut solve = config.solve.clone();
    if let Some(remaining) = cancellation.remaining() {
        solve.time_limit = Some(solve.time_limit.map_or(remaining, |t| t.min(remaining)));
    }

    let row = match run_scenario(&job.scenario, &config.inputs, &config.finance, &solve) {
        Ok(outcome) => {
            let timed_out =
                outcome.dispatch.status.degraded_reason() == Some(DegradedReason::TimeLimit);
            if timed_out && cancellation.is_cancelled() {
                info!(scenario = %job.scenario.name, "solve stopped by sweep deadline");
                return Some(SweepRecord::cancelled(job, "solve stopped by sweep deadline"));
            }
            let record = SweepRecord::evaluated(job, &outcome.dispatch, &outcome.financials);
            if record.status == PointStatus::Degraded {
                warn!(
                    scenario = %job.scenario.name,
                    status = %outcome.dispatch.status,
                    "sweep point degraded"
                );
            }
            record
        }
        Err(err) => {
            warn!(scenario = %job.scenario.name, error = %err, "sweep point failed");
            SweepRecord::error(job, err.to_string())
        }
    };
    Some(row)
}
