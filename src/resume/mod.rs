//! Reconciliation of a seed list against output of earlier runs.
//!
//! Each seed is classified from what a [`TrajectoryProbe`] finds:
//!
//! | on disk                                     | status      |
//! |---------------------------------------------|-------------|
//! | nothing                                     | `Missing`   |
//! | only `.bz2` artifacts (with `compress`)     | `Missing` (compressed; `Excluded` under `require_resume`) |
//! | pair, final time == target                  | `Complete`  |
//! | pair, final time != target                  | `Stale`     |
//! | half a pair, unreadable time                | `Excluded` (logged as inconsistent) |
//! | pair not ending at `continue_from`          | `Excluded` (logged as inconsistent) |
//! | any output, no numeric target               | `Excluded` (logged as inconsistent) |
//!
//! Policy then decides what is submitted: `clean_seedlist` drops complete
//! seeds, `require_resume` drops everything that cannot be continued.
//! Nothing on disk is modified.

pub mod probe;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::TeazerError;
use crate::layout::EnsembleLayout;
pub use probe::{FsProbe, SeedArtifacts, TrajectoryProbe};

/// Absolute tolerance when comparing simulation times.
pub const TIME_TOLERANCE: f64 = 1e-4;

/// Resume classification of one seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    /// Output reached the target final time
    Complete,
    /// No usable output; simulate from scratch
    Missing,
    /// Output ends away from the target; continue from the state vector
    Stale,
    /// Not submitted in this run
    Excluded,
}

impl std::fmt::Display for SeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Complete => "complete",
            Self::Missing => "missing",
            Self::Stale => "stale",
            Self::Excluded => "excluded",
        };
        f.write_str(name)
    }
}

/// Classification result for one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub seed: u64,
    pub status: SeedStatus,
    /// Final time found on disk, if any
    pub final_time: Option<f64>,
    /// Only compressed output exists
    pub compressed: bool,
    /// Why the seed was excluded
    pub note: Option<String>,
}

impl SeedRecord {
    fn new(seed: u64, status: SeedStatus) -> Self {
        Self {
            seed,
            status,
            final_time: None,
            compressed: false,
            note: None,
        }
    }
}

/// Knobs of the resume decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumePolicy {
    /// Probe existing output at all
    pub enabled: bool,
    /// Only a trajectory ending exactly here may be continued
    pub continue_from: Option<f64>,
    /// Submit only seeds that can be continued
    pub require_resume: bool,
    /// Drop complete seeds from the submission
    pub clean_seedlist: bool,
    /// Finished output may have been compressed to `.bz2`
    pub compress: bool,
}

impl Default for ResumePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            continue_from: None,
            require_resume: false,
            clean_seedlist: true,
            compress: false,
        }
    }
}

/// Per-seed records of one ensemble, in seed-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub records: Vec<SeedRecord>,
    clean_seedlist: bool,
}

impl Reconciliation {
    /// Seeds to submit, in seed-list order.
    #[must_use]
    pub fn submit_seeds(&self) -> Vec<u64> {
        self.records
            .iter()
            .filter(|r| match r.status {
                SeedStatus::Missing | SeedStatus::Stale => true,
                SeedStatus::Complete => !self.clean_seedlist,
                SeedStatus::Excluded => false,
            })
            .map(|r| r.seed)
            .collect()
    }

    /// Seeds that continue from an existing state vector.
    #[must_use]
    pub fn stale_seeds(&self) -> BTreeSet<u64> {
        self.records.iter().filter(|r| r.status == SeedStatus::Stale).map(|r| r.seed).collect()
    }

    /// Number of seeds with `status`.
    #[must_use]
    pub fn count(&self, status: SeedStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

/// Classifies seeds of an ensemble and prunes the seed list.
#[derive(Debug, Clone)]
pub struct ResumeReconciler<P: TrajectoryProbe = FsProbe> {
    probe: P,
    policy: ResumePolicy,
}

impl ResumeReconciler<FsProbe> {
    /// Reconciler over the real filesystem.
    #[must_use]
    pub const fn new(policy: ResumePolicy) -> Self {
        Self {
            probe: FsProbe,
            policy,
        }
    }
}

impl<P: TrajectoryProbe> ResumeReconciler<P> {
    /// Reconciler over a custom probe.
    pub const fn with_probe(probe: P, policy: ResumePolicy) -> Self {
        Self {
            probe,
            policy,
        }
    }

    /// Classify every seed against target final time `target`.
    ///
    /// `target` is `None` when the ensemble has no numeric final time; seeds
    /// without output still run, seeds with output are excluded because
    /// their state cannot be judged.
    pub fn reconcile(
        &self,
        layout: &EnsembleLayout,
        basename: &str,
        seeds: &[u64],
        target: Option<f64>,
    ) -> Reconciliation {
        let records = seeds
            .iter()
            .map(|&seed| {
                let record = if self.policy.enabled {
                    self.classify(layout, basename, seed, target)
                } else {
                    SeedRecord::new(seed, SeedStatus::Missing)
                };
                self.apply_policy(record)
            })
            .collect();

        let reconciliation = Reconciliation {
            records,
            clean_seedlist: self.policy.clean_seedlist,
        };
        tracing::debug!(
            "{}: {} complete, {} missing, {} stale, {} excluded",
            layout.root.display(),
            reconciliation.count(SeedStatus::Complete),
            reconciliation.count(SeedStatus::Missing),
            reconciliation.count(SeedStatus::Stale),
            reconciliation.count(SeedStatus::Excluded)
        );
        reconciliation
    }

    fn classify(
        &self,
        layout: &EnsembleLayout,
        basename: &str,
        seed: u64,
        target: Option<f64>,
    ) -> SeedRecord {
        let mut artifacts = self.probe.probe(layout, basename, seed);
        artifacts.compressed &= self.policy.compress;

        if !artifacts.trajectory && !artifacts.statevector {
            let mut record = SeedRecord::new(seed, SeedStatus::Missing);
            record.compressed = artifacts.compressed;
            return record;
        }

        let inconsistent = |reason: String, final_time: Option<f64>| {
            let error = TeazerError::ResumeInconsistency {
                seed,
                dir: layout.traj_dir().display().to_string(),
                reason,
            };
            tracing::warn!("{error}; seed excluded");
            SeedRecord {
                seed,
                status: SeedStatus::Excluded,
                final_time,
                compressed: artifacts.compressed,
                note: Some(error.to_string()),
            }
        };

        if !artifacts.has_pair() {
            let present = if artifacts.trajectory {
                "trajectory without state vector"
            } else {
                "state vector without trajectory"
            };
            return inconsistent(present.to_string(), None);
        }

        let final_time = match artifacts.final_time {
            Some(Ok(t)) => t,
            Some(Err(reason)) => return inconsistent(reason, None),
            None => return inconsistent("trajectory vanished while probing".to_string(), None),
        };

        let Some(target) = target else {
            return inconsistent(
                format!("output ends at t={final_time} but the ensemble has no numeric final time"),
                Some(final_time),
            );
        };

        let status = if approx_eq(final_time, target) {
            SeedStatus::Complete
        } else {
            if let Some(from) = self.policy.continue_from
                && !approx_eq(final_time, from)
            {
                return inconsistent(
                    format!("output ends at t={final_time}, expected continue_from={from}"),
                    Some(final_time),
                );
            }
            if final_time > target {
                tracing::debug!("seed {seed}: output ends at t={final_time}, past the target T={target}");
            }
            SeedStatus::Stale
        };

        SeedRecord {
            seed,
            status,
            final_time: Some(final_time),
            compressed: false,
            note: None,
        }
    }

    fn apply_policy(&self, mut record: SeedRecord) -> SeedRecord {
        let resumable = matches!(record.status, SeedStatus::Stale | SeedStatus::Complete);
        if self.policy.require_resume && !resumable {
            if record.status == SeedStatus::Missing {
                record.note = Some(if record.compressed {
                    "only compressed output exists".to_string()
                } else {
                    "no output to resume from".to_string()
                });
            }
            record.status = SeedStatus::Excluded;
        }
        record
    }
}

/// Times equal within [`TIME_TOLERANCE`].
#[must_use]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory probe keyed by seed.
    #[derive(Default)]
    struct FakeProbe {
        seeds: HashMap<u64, SeedArtifacts>,
    }

    impl FakeProbe {
        fn pair(mut self, seed: u64, final_time: f64) -> Self {
            self.seeds.insert(
                seed,
                SeedArtifacts {
                    trajectory: true,
                    statevector: true,
                    compressed: false,
                    final_time: Some(Ok(final_time)),
                },
            );
            self
        }

        fn with(mut self, seed: u64, artifacts: SeedArtifacts) -> Self {
            self.seeds.insert(seed, artifacts);
            self
        }
    }

    impl TrajectoryProbe for FakeProbe {
        fn probe(&self, _layout: &EnsembleLayout, _basename: &str, seed: u64) -> SeedArtifacts {
            self.seeds.get(&seed).cloned().unwrap_or_default()
        }
    }

    fn statuses(r: &Reconciliation) -> Vec<SeedStatus> {
        r.records.iter().map(|r| r.status).collect()
    }

    fn layout() -> EnsembleLayout {
        EnsembleLayout::new("/sweep/01")
    }

    #[test]
    fn test_basic_classification() {
        let probe = FakeProbe::default().pair(1, 10.0).pair(2, 5.0);
        let reconciler = ResumeReconciler::with_probe(probe, ResumePolicy::default());
        let r = reconciler.reconcile(&layout(), "run", &[1, 2, 3], Some(10.0));

        assert_eq!(statuses(&r), vec![SeedStatus::Complete, SeedStatus::Stale, SeedStatus::Missing]);
        assert_eq!(r.submit_seeds(), vec![2, 3]);
        assert_eq!(r.stale_seeds(), BTreeSet::from([2]));
    }

    #[test]
    fn test_time_tolerance() {
        let probe = FakeProbe::default().pair(1, 10.00005);
        let reconciler = ResumeReconciler::with_probe(probe, ResumePolicy::default());
        let r = reconciler.reconcile(&layout(), "run", &[1], Some(10.0));
        assert_eq!(statuses(&r), vec![SeedStatus::Complete]);
    }

    #[test]
    fn test_keep_complete_without_clean_seedlist() {
        let probe = FakeProbe::default().pair(1, 10.0);
        let policy = ResumePolicy {
            clean_seedlist: false,
            ..ResumePolicy::default()
        };
        let r = ResumeReconciler::with_probe(probe, policy).reconcile(&layout(), "run", &[1], Some(10.0));
        assert_eq!(r.submit_seeds(), vec![1]);
        assert!(r.stale_seeds().is_empty());
    }

    #[test]
    fn test_require_resume_excludes_missing_and_compressed() {
        let compressed = SeedArtifacts {
            compressed: true,
            ..SeedArtifacts::default()
        };
        let probe = FakeProbe::default().pair(1, 5.0).with(2, compressed);
        let policy = ResumePolicy {
            require_resume: true,
            compress: true,
            ..ResumePolicy::default()
        };
        let r = ResumeReconciler::with_probe(probe, policy).reconcile(&layout(), "run", &[1, 2, 3], Some(10.0));

        assert_eq!(statuses(&r), vec![SeedStatus::Stale, SeedStatus::Excluded, SeedStatus::Excluded]);
        assert!(r.records[1].compressed);
        assert_eq!(r.records[1].note.as_deref(), Some("only compressed output exists"));
        assert_eq!(r.submit_seeds(), vec![1]);
    }

    #[test]
    fn test_compressed_only_is_missing_without_require_resume() {
        let compressed = SeedArtifacts {
            compressed: true,
            ..SeedArtifacts::default()
        };
        let probe = FakeProbe::default().with(1, compressed);
        let policy = ResumePolicy {
            compress: true,
            ..ResumePolicy::default()
        };
        let r = ResumeReconciler::with_probe(probe, policy).reconcile(&layout(), "run", &[1], Some(10.0));
        assert_eq!(statuses(&r), vec![SeedStatus::Missing]);
        assert!(r.records[0].compressed);

        // Without `compress` the archive is not looked at.
        let probe = FakeProbe::default().with(1, SeedArtifacts {
            compressed: true,
            ..SeedArtifacts::default()
        });
        let r = ResumeReconciler::with_probe(probe, ResumePolicy::default())
            .reconcile(&layout(), "run", &[1], Some(10.0));
        assert!(!r.records[0].compressed);
    }

    #[test]
    fn test_continue_from_mismatch_is_excluded() {
        let probe = FakeProbe::default().pair(1, 4.0).pair(2, 5.0);
        let policy = ResumePolicy {
            continue_from: Some(5.0),
            ..ResumePolicy::default()
        };
        let r = ResumeReconciler::with_probe(probe, policy).reconcile(&layout(), "run", &[1, 2], Some(10.0));
        assert_eq!(statuses(&r), vec![SeedStatus::Excluded, SeedStatus::Stale]);
        assert!(r.records[0].note.as_deref().unwrap().contains("continue_from"));
    }

    #[test]
    fn test_ambiguous_states_are_excluded() {
        crate::test_utils::init_test_logging(None);
        let half = SeedArtifacts {
            trajectory: true,
            final_time: Some(Ok(1.0)),
            ..SeedArtifacts::default()
        };
        let unreadable = SeedArtifacts {
            trajectory: true,
            statevector: true,
            final_time: Some(Err("garbage".to_string())),
            ..SeedArtifacts::default()
        };
        let probe = FakeProbe::default().with(1, half).with(2, unreadable);
        let r = ResumeReconciler::with_probe(probe, ResumePolicy::default())
            .reconcile(&layout(), "run", &[1, 2], Some(10.0));
        assert_eq!(statuses(&r), vec![SeedStatus::Excluded; 2]);
        assert!(r.submit_seeds().is_empty());

        let r = ResumeReconciler::with_probe(FakeProbe::default().pair(3, 4.0), ResumePolicy::default())
            .reconcile(&layout(), "run", &[3], None);
        assert_eq!(statuses(&r), vec![SeedStatus::Excluded]);
    }

    #[test]
    fn test_output_past_target_is_stale() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = EnsembleLayout::new(temp.path());
        std::fs::create_dir_all(layout.traj_dir()).unwrap();
        std::fs::write(layout.trajectory("run", 1), "0 0\n10 0\n20 0\n").unwrap();
        std::fs::write(layout.statevector("run", 1), "sv").unwrap();

        let r = ResumeReconciler::new(ResumePolicy::default()).reconcile(&layout, "run", &[1], Some(10.0));
        assert_eq!(statuses(&r), vec![SeedStatus::Stale]);
        assert_eq!(r.records[0].final_time, Some(20.0));
        assert_eq!(r.submit_seeds(), vec![1]);
        assert_eq!(r.stale_seeds(), BTreeSet::from([1]));
    }

    #[test]
    fn test_disabled_resume_runs_everything() {
        let probe = FakeProbe::default().pair(1, 10.0);
        let policy = ResumePolicy {
            enabled: false,
            ..ResumePolicy::default()
        };
        let r = ResumeReconciler::with_probe(probe, policy).reconcile(&layout(), "run", &[1, 2], Some(10.0));
        assert_eq!(r.submit_seeds(), vec![1, 2]);
    }

    #[test]
    fn test_reconcile_against_filesystem_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = EnsembleLayout::new(temp.path());
        std::fs::create_dir_all(layout.traj_dir()).unwrap();
        let reconciler = ResumeReconciler::new(ResumePolicy::default());

        let first = reconciler.reconcile(&layout, "run", &[1, 2], Some(1.0));
        assert_eq!(first.submit_seeds(), vec![1, 2]);

        // Simulate the workers finishing.
        for seed in first.submit_seeds() {
            std::fs::write(layout.trajectory("run", seed), "0 0\n1.0 0\n").unwrap();
            std::fs::write(layout.statevector("run", seed), "sv").unwrap();
        }

        let second = reconciler.reconcile(&layout, "run", &[1, 2], Some(1.0));
        assert!(second.submit_seeds().is_empty());
        assert_eq!(second.count(SeedStatus::Complete), 2);
    }
}
