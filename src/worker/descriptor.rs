//! Job descriptor: everything a node needs to run its share of an ensemble.
//!
//! The descriptor is written next to the ensemble logs at submission time
//! and passed to the worker by path, so a node never re-reads the sweep
//! configuration or re-plans.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::SweepConfig;
use crate::engine::Ensemble;
use crate::layout::{EnsembleLayout, trajectory_name};
use crate::seeds::SeedPlan;
use crate::sweep::ParamValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Simulation executable
    pub script: String,
    pub basename: String,
    /// Ensemble root directory
    pub ensemble: PathBuf,
    /// Full parameter assignment passed to the executable
    pub parameters: BTreeMap<String, ParamValue>,
    /// Seeds and partitioning of this submission
    pub seeds: SeedPlan,
    /// Seeds continued from their state vectors
    #[serde(default)]
    pub stale: BTreeSet<u64>,
    /// Node-local staging directory
    #[serde(default)]
    pub tempdir: Option<PathBuf>,
    pub continue_flag: String,
}

impl JobDescriptor {
    #[must_use]
    pub fn new(config: &SweepConfig, ensemble: &Ensemble) -> Self {
        Self {
            script: config.script.clone(),
            basename: config.basename.clone(),
            ensemble: ensemble.layout.root.clone(),
            parameters: ensemble.set.values.clone(),
            seeds: ensemble.seeds.clone(),
            stale: ensemble.reconciliation.stale_seeds(),
            tempdir: config.tempdir.clone(),
            continue_flag: config.continue_flag.clone(),
        }
    }

    #[must_use]
    pub fn layout(&self) -> EnsembleLayout {
        EnsembleLayout::new(&self.ensemble)
    }

    /// Simulation command for `seed`, writing its trajectory below `output_dir`.
    ///
    /// `script --<name> <value>... --seed <seed> --o <output_dir>/<basename>.out.<seed>`,
    /// plus `<continue_flag> <state vector>` for stale seeds.
    #[must_use]
    pub fn command(&self, seed: u64, output_dir: &Path) -> Vec<String> {
        let mut command = vec![self.script.clone()];
        for (name, value) in &self.parameters {
            command.push(format!("--{name}"));
            command.push(value.to_string());
        }
        command.push("--seed".to_string());
        command.push(seed.to_string());
        command.push("--o".to_string());
        command.push(output_dir.join(trajectory_name(&self.basename, seed)).display().to_string());
        if self.stale.contains(&seed) {
            command.push(self.continue_flag.clone());
            command.push(self.layout().statevector(&self.basename, seed).display().to_string());
        }
        command
    }
}
