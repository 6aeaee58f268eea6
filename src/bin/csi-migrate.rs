//! csi-migrate CLI Binary
//!
//! Migrates in-tree PersistentVolumes to CSI, or rolls a migration back from its backup file.

use anyhow::Context;
use clap::Parser;
use csi_migrate::logging::init_logging;
use csi_migrate::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli).context("Error loading configuration")?;
    init_logging(&context.config().logging, &cli.log_overrides())
        .context("Error initializing logging")?;

    let output = context.execute().context("Error while migrating")?;
    tracing::info!("Run completed");
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
