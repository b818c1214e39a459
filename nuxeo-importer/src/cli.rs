/// # nuxeo-importer CLI Interface (Module)
///
/// This module implements the CLI surface of nuxeo-importer: command parsing, the async
/// entrypoint and the wiring of the loaded config to the core import run.
///
/// All import semantics (filename grammar, pipelines, scheduling, reporting) live in the
/// [`nuxeo-importer-core`] crate. This module only builds the HTTP client, installs the
/// Ctrl-C handler and prints the final report.
///
/// ## How To Use
/// - For command-line users: use the installed `nuxeo-importer` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`nuxeo-importer-core`]: ../../nuxeo-importer-core/
use crate::client::NuxeoClient;
use crate::load_config::load_config;
use crate::logging;
use anyhow::Result;
use clap::{Parser, Subcommand};
use nuxeo_importer_core::report::RunReport;
use nuxeo_importer_core::scheduler::import_until;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for nuxeo-importer: import a local directory tree into a Nuxeo repository.
#[derive(Parser)]
#[clap(
    name = "nuxeo-importer",
    version,
    about = "Import a local directory tree into a Nuxeo repository, reading metadata from filenames"
)]
pub struct Cli {
    /// Log every pipeline step and print error details in the report
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import the configured local path under the configured remote path
    Import {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Resolves on the first Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::warn!("Interrupt received, finishing in-flight documents"),
        Err(e) => {
            tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<RunReport> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Import { config } => {
            let mut config = load_config(config)?;
            let verbose = cli.verbose || config.import.verbose;
            config.import.verbose = verbose;
            if verbose && !cli.verbose {
                logging::enable_verbose();
            }
            tracing::info!(command = "import", "Starting import");

            let client = NuxeoClient::new(&config.connection)
                .map_err(|e| anyhow::anyhow!("Cannot build repository client: {e}"))?;
            client
                .login()
                .await
                .map_err(|e| anyhow::anyhow!("Cannot log in to {}: {e}", config.connection.base_url))?;

            match import_until(&config.import, Arc::new(client), ctrl_c()).await {
                Ok(report) => {
                    tracing::info!(
                        command = "import",
                        run_id = %report.run_id,
                        created = report.stats.documents_created(),
                        failed = report.stats.failure_count(),
                        "Import complete"
                    );
                    println!("{}", report.render(verbose));
                    Ok(report)
                }
                Err(e) => {
                    tracing::error!(command = "import", error = %e, "Import failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
