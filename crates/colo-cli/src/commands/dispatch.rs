use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colo_algo::{run_scenario, OptimizationResult, ScenarioOutcome};
use colo_batch::{fixed, SweepPoint};
use colo_core::{SizingParams, SnapshotCalendar, Topology};
use tabwriter::TabWriter;

use super::{load_inputs, percent};
use colo_cli::config::RunConfig;

pub struct DispatchArgs<'a> {
    pub config: &'a Path,
    pub prices: &'a Path,
    pub solar: &'a Path,
    pub topology: Topology,
    pub sizing: SizingParams,
    pub out: &'a Path,
    pub hours: Option<usize>,
}

pub fn handle(args: &DispatchArgs<'_>) -> Result<()> {
    let config = RunConfig::load(args.config)?;
    let finance = config.finance_params()?;
    let inputs = load_inputs(args.prices, args.solar, config.year, args.hours)?;
    let scenario = config.template().scenario(&SweepPoint {
        index: 0,
        topology: args.topology,
        sizing: args.sizing,
    });

    let outcome = run_scenario(&scenario, &inputs, &finance, &config.solve_options())?;
    write_dispatch_csv(args.out, inputs.calendar(), &outcome.dispatch)?;
    print_financials(&scenario.name, &outcome)?;
    println!("Hourly dispatch: {}", args.out.display());
    Ok(())
}

/// One row per snapshot, one column per component series (sorted by name).
pub fn write_dispatch_csv(
    path: &Path,
    calendar: &SnapshotCalendar,
    result: &OptimizationResult,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }

    let mut header = vec!["timestamp".to_string()];
    let mut columns: Vec<&[f64]> = Vec::new();
    for (name, series) in &result.generators {
        header.push(name.clone());
        columns.push(series);
    }
    for (name, unit) in &result.storage {
        header.extend([
            format!("{name}_charge"),
            format!("{name}_discharge"),
            format!("{name}_soc"),
        ]);
        columns.extend([
            unit.charge.as_slice(),
            unit.discharge.as_slice(),
            unit.soc.as_slice(),
        ]);
    }
    for (name, series) in result.loads.iter().chain(&result.links) {
        header.push(name.clone());
        columns.push(series);
    }
    for (bus, prices) in &result.bus_prices {
        header.push(format!("price_{bus}"));
        columns.push(prices);
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating dispatch file '{}'", path.display()))?;
    writer.write_record(&header)?;
    for (t, ts) in calendar.timestamps().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(ts.format("%Y-%m-%d %H:%M").to_string());
        for column in &columns {
            record.push(format!("{:.4}", column.get(t).copied().unwrap_or(0.0)));
        }
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing dispatch file '{}'", path.display()))?;
    Ok(())
}

fn print_financials(name: &str, outcome: &ScenarioOutcome) -> Result<()> {
    let fin = &outcome.financials;
    let y1 = &fin.year1;
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "Scenario\t{name}")?;
    writeln!(writer, "Dispatch status\t{}", outcome.dispatch.status)?;
    writeln!(writer, "Capex\t{}", fixed(fin.capex, 2))?;
    writeln!(writer, "Merchant sales\t{}", fixed(y1.merchant_sales, 2))?;
    writeln!(writer, "Merchant purchases\t{}", fixed(y1.merchant_purchases, 2))?;
    writeln!(writer, "Contract revenue\t{}", fixed(y1.contract_revenue, 2))?;
    writeln!(writer, "Shortfall penalty\t{}", fixed(y1.shortfall_penalty, 2))?;
    writeln!(writer, "Opex\t{}", fixed(y1.opex, 2))?;
    writeln!(writer, "Insurance\t{}", fixed(y1.insurance, 2))?;
    writeln!(writer, "Debt service\t{}", fixed(y1.debt_service, 2))?;
    writeln!(writer, "Tax\t{}", fixed(y1.tax, 2))?;
    writeln!(writer, "NPV\t{}", fixed(fin.npv, 2))?;
    writeln!(writer, "IRR\t{}", percent(fin.irr))?;
    writeln!(
        writer,
        "Payback\t{}",
        fin.payback_years
            .map_or_else(|| "undefined".to_string(), |y| format!("{y} yr"))
    )?;
    writeln!(
        writer,
        "LCOS\t{}",
        fin.lcos
            .map_or_else(|| "undefined".to_string(), |v| format!("{v:.2} $/MWh"))
    )?;
    writeln!(writer, "Cycles per year\t{:.1}", fin.cycles_per_year)?;
    writer.flush()?;
    if let Some(caveat) = &fin.caveat {
        println!("WARNING: {caveat}");
    }
    Ok(())
}
