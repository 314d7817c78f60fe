//! Sweep configuration
//!
//! A sweep is described by TOML layers merged into one table before any
//! expansion starts (see [`layered`]), then converted into a typed
//! [`SweepConfig`] (see [`sweep`]).

pub mod layered;
pub mod sweep;

use anyhow::{Context, Result};
use std::path::Path;

pub use layered::{CONFIG_DIR_ENV, ConfigLayer, LayeredConfig, config_dir};
pub use sweep::{ResumeSettings, SweepConfig};

/// Load all layers for `sweep_file` and build the typed configuration.
///
/// # Errors
///
/// Fails when a layer cannot be read or parsed, or the merged configuration
/// is incomplete or malformed.
pub async fn load_sweep(sweep_file: &Path) -> Result<SweepConfig> {
    let layers = LayeredConfig::load(sweep_file).await?;
    let origins: Vec<String> = layers.origins().map(|p| p.display().to_string()).collect();
    tracing::debug!("Configuration layers: {}", origins.join(" < "));

    SweepConfig::from_table(&layers.merged())
        .with_context(|| format!("Invalid sweep configuration {}", sweep_file.display()))
}
