//! Fixtures: sweep configuration files and fake simulation output.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::EnsembleLayout;
use crate::resume::probe::COMPRESSED_EXT;

/// Builder for sweep configuration files.
#[derive(Clone, Debug)]
pub struct SweepFixture {
    config: Vec<(String, String)>,
    parameters: Vec<(String, String)>,
    extra: String,
}

impl SweepFixture {
    /// Configuration running `script` over `seeds`.
    pub fn new(script: &str, seeds: &str) -> Self {
        Self {
            config: vec![("script".to_string(), quote(script)), ("seeds".to_string(), quote(seeds))],
            parameters: Vec::new(),
            extra: String::new(),
        }
    }

    /// Set `[config] key` to a raw TOML value.
    pub fn config(mut self, key: &str, toml_value: &str) -> Self {
        self.config.push((key.to_string(), toml_value.to_string()));
        self
    }

    /// Output root, written as a TOML string.
    pub fn basedir(self, dir: &Path) -> Self {
        let value = quote(&dir.display().to_string());
        self.config("basedir", &value)
    }

    /// Add a parameter specification (always written as a TOML string).
    pub fn parameter(mut self, name: &str, spec: &str) -> Self {
        self.parameters.push((name.to_string(), quote(spec)));
        self
    }

    /// Append raw TOML (further sections).
    pub fn section(mut self, toml: &str) -> Self {
        self.extra.push_str(toml.trim());
        self.extra.push('\n');
        self
    }

    pub fn content(&self) -> String {
        let mut out = String::from("[config]\n");
        for (key, value) in &self.config {
            let _ = writeln!(out, "{key} = {value}");
        }
        if !self.parameters.is_empty() {
            out.push_str("\n[parameters]\n");
            for (key, value) in &self.parameters {
                let _ = writeln!(out, "{key} = {value}");
            }
        }
        if !self.extra.is_empty() {
            out.push('\n');
            out.push_str(&self.extra);
        }
        out
    }

    /// Write the configuration to `dir/sweep.toml`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("sweep.toml");
        fs::write(&path, self.content()).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn quote(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// Writes fake trajectories and state vectors into an ensemble directory.
#[derive(Clone, Debug)]
pub struct TrajectoryFixture {
    layout: EnsembleLayout,
    basename: String,
}

impl TrajectoryFixture {
    pub fn new(root: impl Into<PathBuf>, basename: &str) -> Self {
        Self {
            layout: EnsembleLayout::new(root),
            basename: basename.to_string(),
        }
    }

    pub fn layout(&self) -> &EnsembleLayout {
        &self.layout
    }

    fn trajectory_text(final_time: f64) -> String {
        let mut text = String::from("# t  <n>  <x>\n");
        let steps: u32 = 4;
        for i in 0..=steps {
            let t = final_time * f64::from(i) / f64::from(steps);
            let _ = writeln!(text, "{t} 0.5 0.25");
        }
        text
    }

    fn write(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Trajectory ending at `final_time` plus its state vector.
    pub fn finished(&self, seed: u64, final_time: f64) -> Result<()> {
        self.trajectory_only(seed, final_time)?;
        self.statevector_only(seed)
    }

    pub fn trajectory_only(&self, seed: u64, final_time: f64) -> Result<()> {
        Self::write(&self.layout.trajectory(&self.basename, seed), &Self::trajectory_text(final_time))
    }

    pub fn statevector_only(&self, seed: u64) -> Result<()> {
        Self::write(&self.layout.statevector(&self.basename, seed), "state")
    }

    /// Only compressed (`.bz2`) artifacts.
    pub fn compressed(&self, seed: u64) -> Result<()> {
        for path in
            [self.layout.trajectory(&self.basename, seed), self.layout.statevector(&self.basename, seed)]
        {
            let mut name = path.into_os_string();
            name.push(format!(".{COMPRESSED_EXT}"));
            Self::write(Path::new(&name), "BZh")?;
        }
        Ok(())
    }
}
