//! Sweep engines
//!
//! An engine turns a [`SweepConfig`] into a [`SweepPlan`]. The set of
//! engines is closed and selected by name, either with `--class` on the
//! command line or `[config] class`:
//!
//! - `generic`: plain parameter sweep, resume per `[resume]`
//! - `continuation`: extends existing trajectories to a later final time;
//!   only seeds that can be continued are submitted
//!
//! Engines only adjust configuration before the shared planning pipeline in
//! [`plan`] runs, so every engine produces the same plan structure.

pub mod plan;

use strsim::levenshtein;

use crate::config::SweepConfig;
use crate::core::TeazerError;
use crate::resume::TrajectoryProbe;
pub use plan::{Ensemble, PlanOptions, SweepPlan, apply_testrun, plan_sweep};

/// Engine used when neither the command line nor the configuration names one.
pub const DEFAULT_ENGINE: &str = "generic";

/// Names of all registered engines.
pub const ENGINES: &[&str] = &["generic", "continuation"];

/// Maximum edit distance for suggestions, as a percentage of the name length.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// A named planning strategy.
pub trait SweepEngine: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// One-line description for listings.
    fn description(&self) -> &'static str;

    /// Adjust the configuration before planning.
    fn configure(&self, config: &mut SweepConfig) {
        let _ = config;
    }

    /// Plan a sweep with this engine.
    ///
    /// # Errors
    ///
    /// Any configuration error raised while planning.
    fn plan(
        &self,
        config: &SweepConfig,
        options: &PlanOptions,
        probe: &dyn TrajectoryProbe,
    ) -> Result<SweepPlan, TeazerError> {
        let mut config = config.clone();
        self.configure(&mut config);
        plan_sweep(&config, options, probe)
    }
}

/// Plain parameter sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericEngine;

impl SweepEngine for GenericEngine {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn description(&self) -> &'static str {
        "parameter sweep over independent trajectories"
    }
}

/// Continue existing trajectories to a later final time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuationEngine;

impl SweepEngine for ContinuationEngine {
    fn name(&self) -> &'static str {
        "continuation"
    }

    fn description(&self) -> &'static str {
        "continue stale trajectories from their state vectors"
    }

    fn configure(&self, config: &mut SweepConfig) {
        let policy = &mut config.resume.policy;
        if !policy.enabled || !policy.require_resume {
            tracing::debug!("continuation engine: enabling resume with require_resume");
        }
        policy.enabled = true;
        policy.require_resume = true;
    }
}

/// Look up an engine by name.
///
/// # Errors
///
/// Returns [`TeazerError::UnknownEngine`] listing the registered names.
pub fn engine_by_name(name: &str) -> Result<Box<dyn SweepEngine>, TeazerError> {
    match name.trim() {
        "generic" => Ok(Box::new(GenericEngine)),
        "continuation" => Ok(Box::new(ContinuationEngine)),
        other => Err(TeazerError::UnknownEngine {
            name: other.to_string(),
            available: ENGINES.iter().map(|e| (*e).to_string()).collect(),
        }),
    }
}

/// Engine named on the command line, else in the configuration, else the default.
///
/// # Errors
///
/// Returns [`TeazerError::UnknownEngine`] for unregistered names.
pub fn select_engine(
    requested: Option<&str>,
    config: &SweepConfig,
) -> Result<Box<dyn SweepEngine>, TeazerError> {
    let name = requested.or(config.class.as_deref()).unwrap_or(DEFAULT_ENGINE);
    engine_by_name(name)
}

/// Registered names close to `name`, closest first.
#[must_use]
pub fn similar_names(name: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> =
        available.iter().map(|candidate| (candidate.clone(), levenshtein(name, candidate))).collect();
    scored.sort_by_key(|(_, distance)| *distance);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= name.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(candidate, _)| candidate)
        .collect()
}
