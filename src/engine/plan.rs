//! Planning: configuration in, ensembles with pruned seed lists out.
//!
//! Planning reads existing output but writes nothing; directories, records
//! and descriptors are created by the submit command once the whole plan
//! exists, so a configuration error never leaves a partial tree behind.

use std::collections::BTreeMap;

use crate::config::SweepConfig;
use crate::core::TeazerError;
use crate::layout::{DirectoryPlanner, EnsembleLayout, NamingMode};
use crate::resume::{Reconciliation, ResumeReconciler, TrajectoryProbe};
use crate::seeds::{SeedPlan, plan_seeds};
use crate::sweep::{ParamValue, ParameterSet, ParameterSpace, Subset, expand_sweep};

/// Parameter overridden with `testrun_dt` in test runs.
pub const TIMESTEP_KEY: &str = "Dt";

/// Per-invocation options that are not part of the configuration.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Two seeds and a short final time
    pub testrun: bool,
    /// Additional subset expression, combined with the configured one
    pub subset: Option<String>,
}

/// One planned ensemble.
#[derive(Debug, Clone)]
pub struct Ensemble {
    /// Parameter assignment
    pub set: ParameterSet,
    /// Output directory
    pub layout: EnsembleLayout,
    /// Seeds to simulate, after resume pruning
    pub seeds: SeedPlan,
    /// Resume classification of the full seed list
    pub reconciliation: Reconciliation,
}

impl Ensemble {
    /// Assignment of the varying parameters only.
    #[must_use]
    pub fn variable(&self, space: &ParameterSpace) -> BTreeMap<String, ParamValue> {
        self.set.project(&space.varying)
    }
}

/// The complete plan of one invocation.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    /// Effective configuration (engine and test-run adjustments applied)
    pub config: SweepConfig,
    /// Every parameter set, before subset filtering
    pub space: ParameterSpace,
    /// Selected ensembles in enumeration order
    pub ensembles: Vec<Ensemble>,
    /// Subset expressions applied, configured one first; all must match
    pub subsets: Vec<String>,
}

impl SweepPlan {
    /// Number of seeds that will be simulated across all ensembles.
    #[must_use]
    pub fn seed_count(&self) -> usize {
        self.ensembles.iter().map(|e| e.seeds.seeds.len()).sum()
    }
}

/// Apply test-run overrides: final time and time step.
pub fn apply_testrun(config: &mut SweepConfig) {
    config
        .parameters
        .insert(config.resume.final_time_key.clone(), config.testrun_t.to_string());
    config.parameters.insert(TIMESTEP_KEY.to_string(), config.testrun_dt.to_string());
}

/// Expand, lay out and reconcile every selected ensemble.
///
/// All configuration errors are raised before the first ensemble is
/// reconciled.
///
/// # Errors
///
/// Any configuration error from subset parsing, expansion or seed planning.
pub fn plan_sweep<P: TrajectoryProbe>(
    config: &SweepConfig,
    options: &PlanOptions,
    probe: P,
) -> Result<SweepPlan, TeazerError> {
    let mut config = config.clone();
    if options.testrun {
        apply_testrun(&mut config);
    }

    let subsets = [config.subset.as_deref(), options.subset.as_deref()]
        .into_iter()
        .flatten()
        .map(|raw| Subset::parse(raw).map(|s| (raw.to_string(), s)))
        .collect::<Result<Vec<_>, _>>()?;

    let space = expand_sweep(&config.parameters, &config.groups, config.combine)?;
    for (raw, subset) in &subsets {
        subset.validate(raw, config.parameters.keys())?;
    }

    let seeds = plan_seeds(&config.seeds, config.cluster, config.parallel, options.testrun)?;

    let mode = if config.numeric_subdirs {
        NamingMode::Numeric
    } else {
        NamingMode::Descriptive
    };
    let directories = DirectoryPlanner::new(&config.basedir, mode, &space);

    let final_time_key = &config.resume.final_time_key;
    if config.resume.policy.enabled && !config.parameters.contains_key(final_time_key) {
        tracing::warn!(
            "Resume is enabled but parameter '{final_time_key}' is not set; existing output cannot be classified"
        );
    }

    let reconciler = ResumeReconciler::with_probe(probe, config.resume.policy.clone());
    let ensembles = space
        .sets
        .iter()
        .filter(|set| subsets.iter().all(|(_, subset)| subset.matches(set)))
        .map(|set| {
            let layout = directories.layout(set);
            let target = set.values.get(final_time_key).and_then(ParamValue::as_f64);
            let reconciliation = reconciler.reconcile(&layout, &config.basename, &seeds.seeds, target);
            Ensemble {
                set: set.clone(),
                seeds: seeds.with_seeds(reconciliation.submit_seeds()),
                layout,
                reconciliation,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Planned {} of {} ensembles below {}",
        ensembles.len(),
        space.sets.len(),
        config.basedir.display()
    );

    Ok(SweepPlan {
        config,
        space,
        ensembles,
        subsets: subsets.into_iter().map(|(raw, _)| raw).collect(),
    })
}
