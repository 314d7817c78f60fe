//! Input handed to the `postprocess` stage.
//!
//! The postprocess command is an external program. It receives the path of
//! a JSON request describing one ensemble as its last argument:
//!
//! ```json
//! {
//!   "basename": "ring",
//!   "ensemble": "/data/ring/eta=1_kappa=0.1",
//!   "datadir": "/data/ring/eta=1_kappa=0.1/traj",
//!   "meandir": "/data/ring/eta=1_kappa=0.1/mean",
//!   "averaged": true,
//!   "parameters": { "T": 100, "eta": 1, "kappa": 0.1 },
//!   "variable": { "eta": 1, "kappa": 0.1 },
//!   "seeds": [1, 2, 3],
//!   "records": [".../parameters.txt", ".../parameters.pkl", ".../parameters.mat"],
//!   "numeric_subdirs": false,
//!   "subsets": ["kappa=0.1,0.2"]
//! }
//! ```
//!
//! `variable` holds only the parameters that vary across the sweep, which is
//! what a postprocessor usually needs to label its output. `seeds` lists
//! every seed of the ensemble, including those finished by earlier runs.
//! `subsets` holds the selection expressions of the submission; an
//! ensemble belongs to the sweep when it matches all of them.
//! Only `parameters.txt` exists when the request is written; the other
//! records are for the postprocessor to produce.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::SweepConfig;
use crate::engine::{Ensemble, SweepPlan};
use crate::sweep::ParamValue;
use crate::utils::write_json_file;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocessRequest {
    pub basename: String,
    pub ensemble: PathBuf,
    /// Trajectory directory
    pub datadir: PathBuf,
    /// Average output directory
    pub meandir: PathBuf,
    /// Whether an average stage runs before postprocessing
    pub averaged: bool,
    pub parameters: BTreeMap<String, ParamValue>,
    pub variable: BTreeMap<String, ParamValue>,
    pub seeds: Vec<u64>,
    /// Parameter record files of the ensemble
    pub records: Vec<PathBuf>,
    /// Ensembles live in numbered directories
    pub numeric_subdirs: bool,
    pub subsets: Vec<String>,
}

impl PostprocessRequest {
    #[must_use]
    pub fn new(plan: &SweepPlan, ensemble: &Ensemble) -> Self {
        let config: &SweepConfig = &plan.config;
        Self {
            basename: config.basename.clone(),
            ensemble: ensemble.layout.root.clone(),
            datadir: ensemble.layout.traj_dir(),
            meandir: ensemble.layout.mean_dir(),
            averaged: config.average,
            parameters: ensemble.set.values.clone(),
            variable: ensemble.variable(&plan.space),
            seeds: ensemble.reconciliation.records.iter().map(|r| r.seed).collect(),
            records: ensemble.layout.parameter_records().to_vec(),
            numeric_subdirs: config.numeric_subdirs,
            subsets: plan.subsets.clone(),
        }
    }

    /// Write the request where the postprocess stage expects it.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write(&self) -> Result<PathBuf> {
        let path = crate::layout::EnsembleLayout::new(&self.ensemble).postprocess_request(&self.basename);
        write_json_file(&path, self)?;
        Ok(path)
    }
}
