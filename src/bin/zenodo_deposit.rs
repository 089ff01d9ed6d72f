// Entrypoint for `zenodo-deposit`.
// - Parses the parameter file and validates the metadata up front.
// - Opens the run log and hands it to the deposit flow.
// - Returns `anyhow::Result` so any failure exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use gnps_deposit::deposit::{self, DepositionPlan, Outcome};
use gnps_deposit::log::RunLog;
use gnps_deposit::params::{DepositParams, Endpoints, ParamFile};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "zenodo-deposit", about = "Upload task files to Zenodo")]
struct Cli {
    /// YAML containing the deposition parameters.
    input_yaml_params: PathBuf,
    /// Task file to upload.
    input_upload_file: PathBuf,
    /// Path to output log file.
    output_deposition_log: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut log = RunLog::create(&cli.output_deposition_log)
        .with_context(|| format!("creating log {}", cli.output_deposition_log.display()))?;

    let params = ParamFile::load(&cli.input_yaml_params)
        .with_context(|| format!("reading {}", cli.input_yaml_params.display()))?;
    let (deposit_params, plan) = DepositParams::from_params(&params)
        .and_then(|p| DepositionPlan::new(&p, cli.input_upload_file.clone()).map(|plan| (p, plan)))
        .map_err(|e| {
            log.error(e.to_string());
            e
        })?;

    let endpoints = Endpoints::from_env();
    let client = deposit::connect(
        &endpoints,
        deposit_params.access_token.as_deref(),
        plan.dry_run,
        &mut log,
    )?;

    match deposit::run(&client, &plan, &mut log)? {
        Outcome::DryRun => tracing::info!("dry run finished"),
        Outcome::Deposited { deposition_id, published } => {
            tracing::info!(deposition_id, published, "deposition finished")
        }
    }
    Ok(())
}
