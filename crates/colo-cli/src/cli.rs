use clap::{Parser, Subcommand};
use colo_core::Topology;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "PV + battery co-location sensitivity analysis", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write seeded synthetic price and solar profiles for demos
    Synth {
        #[arg(long, default_value_t = 2023)]
        year: i32,
        /// Number of hourly snapshots (at most one non-leap year)
        #[arg(long, default_value_t = 8760)]
        hours: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output directory for prices.csv and solar.csv
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the sensitivity sweep defined by a config file
    Sweep {
        /// Sweep definition (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Hourly wholesale prices (CSV, last column)
        #[arg(long)]
        prices: PathBuf,
        /// Hourly PV capacity factors (CSV, last column)
        #[arg(long)]
        solar: PathBuf,
        /// Output directory for the result table and manifest
        #[arg(long)]
        out: PathBuf,
        /// Worker threads (0 = all cores)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Stop the whole sweep after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Only simulate the first N hours (inputs must otherwise span 8760 hours)
        #[arg(long)]
        hours: Option<usize>,
    },
    /// Dispatch and evaluate a single configuration
    Dispatch {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        prices: PathBuf,
        #[arg(long)]
        solar: PathBuf,
        /// standalone, ac_coupled or dc_coupled
        #[arg(long)]
        topology: Topology,
        #[arg(long)]
        pv_mw: f64,
        #[arg(long)]
        bess_mw: f64,
        #[arg(long)]
        duration_h: f64,
        /// Grid connection capacity (defaults from the sizing)
        #[arg(long)]
        connection_mw: Option<f64>,
        /// Hourly dispatch CSV to write
        #[arg(long)]
        out: PathBuf,
        /// Only simulate the first N hours (inputs must otherwise span 8760 hours)
        #[arg(long)]
        hours: Option<usize>,
    },
}
