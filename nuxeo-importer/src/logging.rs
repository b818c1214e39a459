//! Process-wide tracing setup for the binary.
//!
//! The subscriber is installed before the config file is read, so its level
//! sits behind a reload handle: a `verbose: true` in the config can still
//! raise it to DEBUG once loaded.

use std::sync::OnceLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

static LEVEL: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the global fmt subscriber writing to stdout.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let (filter, handle) = reload::Layer::new(level_for(verbose));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Cannot install tracing subscriber: {e}"))?;
    let _ = LEVEL.set(handle);
    Ok(())
}

/// Raises the installed subscriber to DEBUG. No-op when [`init`] was not called.
pub fn enable_verbose() {
    let Some(handle) = LEVEL.get() else {
        return;
    };
    match handle.modify(|level| *level = level_for(true)) {
        Ok(()) => tracing::debug!("Verbose logging enabled"),
        Err(e) => tracing::warn!(error = %e, "Cannot raise log level"),
    }
}
