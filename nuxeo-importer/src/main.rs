use anyhow::Result;
use clap::Parser;
use nuxeo_importer::cli::{run, Cli};
use nuxeo_importer::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing for the CLI.
    logging::init(cli.verbose)?;
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    tracing::info!("CLI arguments parsed, invoking run");
    match run(cli).await {
        Ok(report) if report.is_success() => {
            tracing::info!("CLI completed successfully");
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => {
            tracing::warn!("CLI completed with failures");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            Err(e)
        }
    }
}
