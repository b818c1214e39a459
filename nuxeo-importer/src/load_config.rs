/// `load_config` module: loads the static YAML config and injects secrets from the environment.
///
/// This module is the only place where the user-supplied YAML is parsed and mapped to the
/// strongly-typed [`ImportConfig`] and [`ConnectionConfig`] of the core crate.
///
/// # Responsibilities
/// - Parse the YAML file (`connection` and `import` sections)
/// - Inject the repository password from `NUXEO_PASSWORD` (never read from the file)
/// - Resolve a relative `local_path` against the process working directory
/// - Validate both sections before any network call is made
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use nuxeo_importer_core::config::{ConnectionConfig, ImportConfig};
use nuxeo_importer_core::walker::resolve_local_path;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Environment variable holding the repository password.
pub const PASSWORD_ENV: &str = "NUXEO_PASSWORD";

#[derive(Debug)]
pub struct CliConfig {
    pub connection: ConnectionConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    connection: ConnectionConfig,
    import: ImportConfig,
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => {
            info!("{PASSWORD_ENV} found in env");
            password
        }
        Err(e) => {
            error!(error = ?e, "{PASSWORD_ENV} environment variable not set");
            return Err(anyhow::anyhow!(
                "{PASSWORD_ENV} environment variable not set: {e}"
            ));
        }
    };

    let cwd = std::env::current_dir()
        .map_err(|e| anyhow::anyhow!("Cannot determine the current directory: {e}"))?;

    let connection = ConnectionConfig {
        password,
        ..raw.connection
    };
    let import = ImportConfig {
        local_path: resolve_local_path(&raw.import.local_path, &cwd),
        ..raw.import
    };

    if let Err(e) = connection.validate() {
        error!(error = %e, "Invalid connection section");
        anyhow::bail!("Invalid connection config: {e}");
    }
    if let Err(e) = import.validate() {
        error!(error = %e, "Invalid import section");
        anyhow::bail!("Invalid import config: {e}");
    }

    info!(
        base_url = %connection.base_url,
        username = %connection.username,
        timeout_ms = ?connection.timeout_ms,
        "Connection config loaded"
    );
    import.trace_loaded();

    Ok(CliConfig { connection, import })
}
