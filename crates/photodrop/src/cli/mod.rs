//! Command implementations.

pub mod config;
pub mod ingest;

use anyhow::Context;
use photodrop_core::Config;
use std::path::Path;

/// Load configuration from an explicit file, or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Configuration for a command run.
///
/// A file named with `--config` must load. A broken file at the default
/// location only warns and falls back to defaults.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display()));
    }

    // Logging isn't initialized yet, so use eprintln for config warnings.
    Ok(Config::load().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config: {e}\n  \
             Using default configuration. Check your config file with `photodrop config path`."
        );
        Config::default()
    }))
}
