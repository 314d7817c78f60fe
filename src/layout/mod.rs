//! Output directory layout of a sweep.
//!
//! Every ensemble owns a directory below the sweep's `basedir`:
//!
//! ```text
//! <basedir>/<component>/
//! ├── parameters.txt        # sorted `key = value` lines
//! ├── parameters.pkl        # written by the external I/O layer
//! ├── parameters.mat        # written by the external I/O layer
//! ├── log/                  # scheduler output, job descriptors
//! ├── mean/                 # <basename>_mean.npz, <basename>_mean.mat
//! └── traj/                 # <basename>.out.<seed>, <basename>.out.<seed>.sv
//! ```
//!
//! The component is either descriptive (`kappa=0.1_eta=2`, built from the
//! varying parameters in name order) or numeric (`01`, `02`, ...; 1-based
//! position in the unfiltered enumeration). Descriptive names depend only on
//! the assignment itself; numeric names depend on the enumeration order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::sweep::{ParamValue, ParameterSet, ParameterSpace};
use crate::utils::fs::{atomic_write, ensure_dir};

/// Name of the plain-text parameter record.
pub const PARAMETERS_TXT: &str = "parameters.txt";

/// How ensemble directories are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingMode {
    /// Sorted `key=value` pairs of the varying parameters
    Descriptive,
    /// Zero-padded enumeration index
    Numeric,
}

/// Paths belonging to one ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleLayout {
    /// Ensemble root
    pub root: PathBuf,
}

impl EnsembleLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    #[must_use]
    pub fn mean_dir(&self) -> PathBuf {
        self.root.join("mean")
    }

    #[must_use]
    pub fn traj_dir(&self) -> PathBuf {
        self.root.join("traj")
    }

    /// `parameters.txt`, `parameters.pkl` and `parameters.mat`.
    #[must_use]
    pub fn parameter_records(&self) -> [PathBuf; 3] {
        ["txt", "pkl", "mat"].map(|ext| self.root.join(format!("parameters.{ext}")))
    }

    /// Averaged output `mean/<basename>_mean.<ext>`.
    #[must_use]
    pub fn mean_file(&self, basename: &str, ext: &str) -> PathBuf {
        self.mean_dir().join(format!("{basename}_mean.{ext}"))
    }

    /// Trajectory of one seed: `traj/<basename>.out.<seed>`.
    #[must_use]
    pub fn trajectory(&self, basename: &str, seed: u64) -> PathBuf {
        self.traj_dir().join(trajectory_name(basename, seed))
    }

    /// State vector next to the trajectory: `traj/<basename>.out.<seed>.sv`.
    #[must_use]
    pub fn statevector(&self, basename: &str, seed: u64) -> PathBuf {
        self.traj_dir().join(format!("{}.sv", trajectory_name(basename, seed)))
    }

    /// Serialized job descriptor handed to workers.
    #[must_use]
    pub fn descriptor(&self, basename: &str) -> PathBuf {
        self.log_dir().join(format!("{basename}.job.json"))
    }

    /// Serialized postprocess request.
    #[must_use]
    pub fn postprocess_request(&self, basename: &str) -> PathBuf {
        self.log_dir().join(format!("{basename}.postprocess.json"))
    }

    /// Create `log/`, `mean/`, `traj/` and write `parameters.txt`.
    ///
    /// # Errors
    ///
    /// Fails when a directory or the parameter record cannot be written.
    pub fn prepare(&self, set: &ParameterSet) -> Result<()> {
        for dir in [self.log_dir(), self.mean_dir(), self.traj_dir()] {
            ensure_dir(&dir)?;
        }
        let record = self.root.join(PARAMETERS_TXT);
        atomic_write(&record, render_parameters(set).as_bytes())
            .with_context(|| format!("Failed to write parameter record for {}", self.root.display()))
    }
}

/// File name of a seed's trajectory.
#[must_use]
pub fn trajectory_name(basename: &str, seed: u64) -> String {
    format!("{basename}.out.{seed}")
}

/// Parameter record as sorted `key = value` lines.
#[must_use]
pub fn render_parameters(set: &ParameterSet) -> String {
    let mut out = String::new();
    for (name, value) in &set.values {
        let rendered = match value {
            ParamValue::Text(s) => toml::Value::String(s.clone()).to_string(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{name} = {rendered}");
    }
    out
}

/// Maps parameter sets to their ensemble directories.
#[derive(Debug, Clone)]
pub struct DirectoryPlanner {
    basedir: PathBuf,
    mode: NamingMode,
    varying: BTreeSet<String>,
    width: usize,
}

impl DirectoryPlanner {
    /// Planner for the sets of `space` below `basedir`.
    #[must_use]
    pub fn new(basedir: impl Into<PathBuf>, mode: NamingMode, space: &ParameterSpace) -> Self {
        let digits = space.sets.len().max(1).to_string().len();
        Self {
            basedir: basedir.into(),
            mode,
            varying: space.varying.clone(),
            width: digits.max(2),
        }
    }

    /// Directory component of a set, or `None` when the set lives directly
    /// in `basedir` (descriptive mode without varying parameters).
    #[must_use]
    pub fn component(&self, set: &ParameterSet) -> Option<String> {
        match self.mode {
            NamingMode::Numeric => Some(format!("{:0width$}", set.index + 1, width = self.width)),
            NamingMode::Descriptive => {
                let pairs: Vec<String> = set
                    .project(&self.varying)
                    .into_iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                (!pairs.is_empty()).then(|| pairs.join("_"))
            }
        }
    }

    /// Layout of the ensemble for `set`.
    #[must_use]
    pub fn layout(&self, set: &ParameterSet) -> EnsembleLayout {
        match self.component(set) {
            Some(component) => EnsembleLayout::new(self.basedir.join(component)),
            None => EnsembleLayout::new(self.basedir.clone()),
        }
    }
}
