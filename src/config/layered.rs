//! Ordered-override loading of sweep configuration files.
//!
//! Layers, lowest priority first:
//!
//! 1. global defaults: `<config dir>/config.toml`
//! 2. per-script defaults: `<config dir>/<script file name>.toml`
//! 3. the sweep file given on the command line
//!
//! `<config dir>` is `~/.teazer`, or `$TEAZER_CONFIG_DIR` when set. Missing
//! default layers are skipped. Layers merge per key inside each section, so
//! a sweep file that sets `[config] seeds` keeps the global `queue`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::TeazerError;
use crate::utils::get_home_dir;

/// Environment variable overriding the directory of default layers.
pub const CONFIG_DIR_ENV: &str = "TEAZER_CONFIG_DIR";

/// File name of the global layer inside the config directory.
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Directory holding the global and per-script layers.
///
/// # Errors
///
/// Fails when `$TEAZER_CONFIG_DIR` is unset and no home directory exists.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    Ok(get_home_dir()?.join(".teazer"))
}

/// One parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    /// Where the layer was read from
    pub origin: PathBuf,
    /// Parsed content
    pub table: toml::Table,
}

impl ConfigLayer {
    /// Parse `content` read from `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::ConfigParse`] naming the file for invalid TOML.
    pub fn parse(origin: impl Into<PathBuf>, content: &str) -> Result<Self, TeazerError> {
        let origin = origin.into();
        let table = toml::from_str::<toml::Table>(content).map_err(|e| TeazerError::ConfigParse {
            file: origin.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            origin,
            table,
        })
    }

    /// Read and parse a layer file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid TOML.
    pub async fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        Ok(Self::parse(path, &content)?)
    }

    /// Read a layer if its file exists.
    async fn read_optional(path: &Path) -> Result<Option<Self>> {
        if fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!("Loading configuration layer {}", path.display());
            Ok(Some(Self::read(path).await?))
        } else {
            Ok(None)
        }
    }

    /// Raw string value of `[section] key`, if present and a string.
    fn get_str(&self, section: &str, key: &str) -> Option<&str> {
        self.table.get(section)?.as_table()?.get(key)?.as_str()
    }
}

/// Configuration layers in increasing priority.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    layers: Vec<ConfigLayer>,
}

impl LayeredConfig {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer overriding all previous ones.
    pub fn push(&mut self, layer: ConfigLayer) {
        self.layers.push(layer);
    }

    /// Files the configuration was assembled from, lowest priority first.
    pub fn origins(&self) -> impl Iterator<Item = &Path> {
        self.layers.iter().map(|l| l.origin.as_path())
    }

    /// Load the global, per-script and command-line layers.
    ///
    /// The script name that selects the per-script layer is taken from the
    /// command-line file, falling back to the global layer.
    ///
    /// # Errors
    ///
    /// Fails when a present layer cannot be read or parsed, or when no
    /// layer names `[config] script`.
    pub async fn load(sweep_file: &Path) -> Result<Self> {
        Self::load_from_dir(sweep_file, &config_dir()?).await
    }

    /// [`LayeredConfig::load`] with an explicit default-layer directory.
    ///
    /// # Errors
    ///
    /// See [`LayeredConfig::load`].
    pub async fn load_from_dir(sweep_file: &Path, dir: &Path) -> Result<Self> {
        let local = ConfigLayer::read(sweep_file).await?;
        let global = ConfigLayer::read_optional(&dir.join(GLOBAL_CONFIG_FILE)).await?;

        let script = local
            .get_str("config", "script")
            .or_else(|| global.as_ref().and_then(|g| g.get_str("config", "script")))
            .ok_or_else(|| TeazerError::MissingKey {
                section: "config".to_string(),
                key: "script".to_string(),
            })?;

        let per_script = match Path::new(script).file_name() {
            Some(name) => {
                let mut file = name.to_os_string();
                file.push(".toml");
                ConfigLayer::read_optional(&dir.join(file)).await?
            }
            None => None,
        };

        let mut stack = Self::new();
        stack.layers.extend(global);
        stack.layers.extend(per_script);
        stack.push(local);
        Ok(stack)
    }

    /// Merge all layers: per key inside tables, whole values otherwise.
    #[must_use]
    pub fn merged(&self) -> toml::Table {
        let mut merged = toml::Table::new();
        for layer in &self.layers {
            for (section, value) in &layer.table {
                match (merged.get_mut(section), value) {
                    (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                        for (key, v) in incoming {
                            existing.insert(key.clone(), v.clone());
                        }
                    }
                    _ => {
                        merged.insert(section.clone(), value.clone());
                    }
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layer(name: &str, content: &str) -> ConfigLayer {
        ConfigLayer::parse(name, content).unwrap()
    }

    #[test]
    fn test_merge_is_per_key() {
        let mut stack = LayeredConfig::new();
        stack.push(layer("global", "[config]\nqueue = \"long.q\"\nseeds = \"1\"\n"));
        stack.push(layer("local", "[config]\nseeds = \"1:10\"\n[parameters]\nT = 5\n"));

        let merged = stack.merged();
        let config = merged["config"].as_table().unwrap();
        assert_eq!(config["queue"].as_str(), Some("long.q"));
        assert_eq!(config["seeds"].as_str(), Some("1:10"));
        assert_eq!(merged["parameters"]["T"].as_integer(), Some(5));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = ConfigLayer::parse("sweep.toml", "[config\nscript = 1").unwrap_err();
        match err {
            TeazerError::ConfigParse { file, .. } => assert_eq!(file, "sweep.toml"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_uses_per_script_layer() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("defaults");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[config]\nqueue = \"global.q\"\ncluster = 1\n").unwrap();
        std::fs::write(dir.join("ring.toml"), "[config]\ncluster = 4\nparallel = 2\n").unwrap();

        let sweep = temp.path().join("sweep.toml");
        std::fs::write(&sweep, "[config]\nscript = \"/opt/bin/ring\"\nparallel = 3\n").unwrap();

        let stack = LayeredConfig::load_from_dir(&sweep, &dir).await.unwrap();
        assert_eq!(stack.origins().count(), 3);

        let merged = stack.merged();
        let config = merged["config"].as_table().unwrap();
        assert_eq!(config["queue"].as_str(), Some("global.q"));
        assert_eq!(config["cluster"].as_integer(), Some(4));
        assert_eq!(config["parallel"].as_integer(), Some(3));
    }

    #[tokio::test]
    async fn test_load_without_defaults() {
        let temp = TempDir::new().unwrap();
        let sweep = temp.path().join("sweep.toml");
        std::fs::write(&sweep, "[config]\nscript = \"ring\"\n").unwrap();

        let stack = LayeredConfig::load_from_dir(&sweep, &temp.path().join("absent")).await.unwrap();
        assert_eq!(stack.origins().collect::<Vec<_>>(), vec![sweep.as_path()]);
    }

    #[tokio::test]
    async fn test_load_requires_script() {
        let temp = TempDir::new().unwrap();
        let sweep = temp.path().join("sweep.toml");
        std::fs::write(&sweep, "[config]\nseeds = \"1\"\n").unwrap();

        let err = LayeredConfig::load_from_dir(&sweep, temp.path()).await.unwrap_err();
        let teazer = err.downcast_ref::<TeazerError>().unwrap();
        assert!(matches!(teazer, TeazerError::MissingKey { key, .. } if key == "script"));
    }
}
