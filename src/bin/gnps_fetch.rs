// Entrypoint for `gnps-fetch`: read the task id from the parameter file and
// download its result archive.

use anyhow::{Context, Result};
use clap::Parser;
use gnps_deposit::fetch;
use gnps_deposit::params::{Endpoints, FetchParams, ParamFile};
use gnps_deposit::ui::download_bar;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gnps-fetch", about = "Download task results file")]
struct Cli {
    /// YAML containing the deposition parameters.
    input_yaml_params: PathBuf,
    /// Task ZIP/TAR file output path.
    output_task_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let params = ParamFile::load(&cli.input_yaml_params)
        .with_context(|| format!("reading {}", cli.input_yaml_params.display()))?;
    let fetch_params = FetchParams::from_params(&params)?;
    let endpoints = Endpoints::from_env();
    let client = fetch::client()?;

    let bytes = fetch::fetch(
        &client,
        &endpoints,
        &fetch_params.task,
        &cli.output_task_path,
        download_bar,
    )
    .with_context(|| format!("downloading task {}", fetch_params.task.task_id))?;

    tracing::info!(bytes, output = %cli.output_task_path.display(), "download complete");
    Ok(())
}
