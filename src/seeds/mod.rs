//! Seed expansion and partitioning into scheduler sub-jobs.
//!
//! A sweep runs every ensemble once per seed. Seeds are distributed over an
//! array job: each sub-job runs `parallel` threads and each thread runs
//! `cluster` seeds one after another. Sub-job `s` (1-based, as the scheduler
//! numbers array tasks) and thread `p` (0-based) own the contiguous slice
//! starting at `((s - 1) * parallel + p) * cluster`.
//!
//! The mapping only depends on the seed list and the two factors, so a
//! worker recomputes its slice from its own indices without coordination.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::TeazerError;
use crate::sweep::{ParamValue, expand_range};

/// Number of seeds kept in test-run mode.
pub const TESTRUN_SEEDS: usize = 2;

/// An ordered seed list together with its partitioning factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPlan {
    /// Seeds in submission order
    pub seeds: Vec<u64>,
    /// Seeds run serially by one thread
    pub cluster: usize,
    /// Threads per sub-job
    pub parallel: usize,
}

impl SeedPlan {
    /// Create a plan from an already expanded seed list.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::InvalidValue`] when `cluster` or `parallel` is zero.
    pub fn new(seeds: Vec<u64>, cluster: usize, parallel: usize) -> Result<Self, TeazerError> {
        for (key, factor) in [("cluster", cluster), ("parallel", parallel)] {
            if factor == 0 {
                return Err(TeazerError::InvalidValue {
                    key: key.to_string(),
                    raw: factor.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(Self {
            seeds,
            cluster,
            parallel,
        })
    }

    /// Same factors over a different seed list (e.g. after resume pruning).
    #[must_use]
    pub fn with_seeds(&self, seeds: Vec<u64>) -> Self {
        Self {
            seeds,
            cluster: self.cluster,
            parallel: self.parallel,
        }
    }

    /// Whether there is nothing to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Seeds handled by one sub-job.
    #[must_use]
    pub const fn seeds_per_subjob(&self) -> usize {
        self.cluster * self.parallel
    }

    /// Number of array tasks: `ceil(seeds / (cluster * parallel))`.
    #[must_use]
    pub fn array_size(&self) -> usize {
        self.seeds.len().div_ceil(self.seeds_per_subjob())
    }

    /// Seeds of thread `thread` (0-based) in sub-job `subjob` (1-based).
    ///
    /// Out-of-range indices yield an empty slice; the last slice may be
    /// shorter than `cluster`.
    #[must_use]
    pub fn slice(&self, subjob: usize, thread: usize) -> &[u64] {
        if subjob == 0 || thread >= self.parallel {
            return &[];
        }
        let start = ((subjob - 1) * self.parallel + thread) * self.cluster;
        if start >= self.seeds.len() {
            return &[];
        }
        let end = (start + self.cluster).min(self.seeds.len());
        &self.seeds[start..end]
    }

    /// Non-empty thread slices of a sub-job, in thread order.
    #[must_use]
    pub fn subjob_slices(&self, subjob: usize) -> Vec<&[u64]> {
        (0..self.parallel).map(|p| self.slice(subjob, p)).filter(|s| !s.is_empty()).collect()
    }
}

/// Expand a seed specification: a single integer, a `,`/`;` separated list,
/// or a slice `start:stop` / `start:step:stop` (inclusive).
///
/// # Errors
///
/// - [`TeazerError::MalformedRange`] for unparseable specifications
/// - [`TeazerError::InvalidValue`] for negative or non-integral seeds
/// - [`TeazerError::DuplicateSeed`] when a seed appears twice
pub fn expand_seeds(raw: &str) -> Result<Vec<u64>, TeazerError> {
    let values = expand_range("seeds", &raw.replace(',', ";")).map_err(|e| match e {
        TeazerError::MalformedRange {
            key,
            reason,
            ..
        } => TeazerError::MalformedRange {
            key,
            raw: raw.to_string(),
            reason,
        },
        other => other,
    })?;

    let mut seen = BTreeSet::new();
    let mut seeds = Vec::with_capacity(values.len());
    for value in values {
        let seed = match value {
            ParamValue::Int(i) => u64::try_from(i).ok(),
            _ => None,
        }
        .ok_or_else(|| TeazerError::InvalidValue {
            key: "seeds".to_string(),
            raw: raw.to_string(),
            reason: format!("'{value}' is not a non-negative integer"),
        })?;

        if !seen.insert(seed) {
            return Err(TeazerError::DuplicateSeed {
                seed,
                raw: raw.to_string(),
            });
        }
        seeds.push(seed);
    }
    Ok(seeds)
}

/// Expand the seed specification and attach the partitioning factors.
///
/// In test-run mode only the first [`TESTRUN_SEEDS`] seeds are kept.
///
/// # Errors
///
/// Any error of [`expand_seeds`] or [`SeedPlan::new`].
pub fn plan_seeds(
    raw: &str,
    cluster: usize,
    parallel: usize,
    testrun: bool,
) -> Result<SeedPlan, TeazerError> {
    let mut seeds = expand_seeds(raw)?;
    if testrun {
        seeds.truncate(TESTRUN_SEEDS);
    }
    tracing::debug!(
        "Planned {} seeds (cluster={cluster}, parallel={parallel}, testrun={testrun})",
        seeds.len()
    );
    SeedPlan::new(seeds, cluster, parallel)
}
