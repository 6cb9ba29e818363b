use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use colo_batch::{
    fixed, jobs_from_points, run_sweep, SweepCancellation, SweepRunnerConfig, SweepSummary,
};
use tabwriter::TabWriter;
use tracing::info;

use super::{load_inputs, percent};
use colo_cli::config::RunConfig;

pub struct SweepArgs<'a> {
    pub config: &'a Path,
    pub prices: &'a Path,
    pub solar: &'a Path,
    pub out: &'a Path,
    pub threads: usize,
    pub timeout_secs: Option<u64>,
    pub hours: Option<usize>,
}

pub fn handle(args: &SweepArgs<'_>) -> Result<()> {
    let config = RunConfig::load(args.config)?;
    let grid = config
        .grid
        .as_ref()
        .ok_or_else(|| anyhow!("config '{}' has no [grid] section", args.config.display()))?;
    let finance = config.finance_params()?;
    let points = grid.points()?;
    let inputs = load_inputs(args.prices, args.solar, config.year, args.hours)?;

    let cancellation = match args.timeout_secs {
        Some(secs) => SweepCancellation::with_timeout(Duration::from_secs(secs)),
        None => SweepCancellation::new(),
    };
    info!(
        points = points.len(),
        hours = inputs.len(),
        threads = args.threads,
        "starting sweep"
    );

    let summary = run_sweep(&SweepRunnerConfig {
        jobs: jobs_from_points(&points, &config.template()),
        inputs,
        finance,
        solve: config.solve_options(),
        output_root: args.out.to_path_buf(),
        threads: args.threads,
        cancellation,
    })?;
    print_summary(&summary)?;
    Ok(())
}

fn print_summary(summary: &SweepSummary) -> Result<()> {
    let comparison = summary.table.comparison();
    let counts = comparison.counts;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(
        writer,
        "TOPOLOGY\tPV MW\tBESS MW\tDURATION H\tNPV\tIRR\tPAYBACK\tLCOS"
    )?;
    for best in &comparison.best {
        if let Some(m) = &best.row.metrics {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                best.topology,
                best.row.pv_mw,
                best.row.bess_mw,
                best.row.duration_h,
                fixed(m.npv, 2),
                percent(m.irr),
                m.payback_years
                    .map_or_else(|| "undefined".to_string(), |y| format!("{y} yr")),
                m.lcos
                    .map_or_else(|| "undefined".to_string(), |v| format!("{v:.2}")),
            )?;
        }
    }
    writer.flush()?;

    println!();
    println!(
        "{} points: {} valid, {} degraded, {} error, {} cancelled",
        summary.table.len(),
        counts.valid,
        counts.degraded,
        counts.error,
        counts.cancelled
    );
    if counts.degraded > 0 {
        println!("Degraded points use a fallback dispatch and are excluded from the comparison.");
    }
    println!("Results: {}", summary.table_path.display());
    println!("Manifest: {}", summary.manifest_path.display());
    Ok(())
}
