use clap::Parser;
use colo_cli::cli::{Cli, Commands};
use colo_core::SizingParams;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::dispatch::DispatchArgs;
use commands::sweep::SweepArgs;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let (name, result) = match &cli.command {
        Commands::Synth {
            year,
            hours,
            seed,
            out,
        } => ("synth", commands::synth::handle(*year, *hours, *seed, out)),
        Commands::Sweep {
            config,
            prices,
            solar,
            out,
            threads,
            timeout_secs,
            hours,
        } => (
            "sweep",
            commands::sweep::handle(&SweepArgs {
                config,
                prices,
                solar,
                out,
                threads: *threads,
                timeout_secs: *timeout_secs,
                hours: *hours,
            }),
        ),
        Commands::Dispatch {
            config,
            prices,
            solar,
            topology,
            pv_mw,
            bess_mw,
            duration_h,
            connection_mw,
            out,
            hours,
        } => {
            let mut sizing = SizingParams::new(*pv_mw, *bess_mw, *duration_h);
            if let Some(mw) = connection_mw {
                sizing = sizing.with_connection(*mw);
            }
            (
                "dispatch",
                commands::dispatch::handle(&DispatchArgs {
                    config,
                    prices,
                    solar,
                    topology: *topology,
                    sizing,
                    out,
                    hours: *hours,
                }),
            )
        }
    };

    match result {
        Ok(()) => info!("{name} command successful"),
        Err(e) => {
            error!("{name} command failed: {e:?}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
