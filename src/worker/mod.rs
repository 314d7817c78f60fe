//! Node-side execution of one array task.
//!
//! The scheduler starts `teazer worker <descriptor>` once per array task.
//! The worker recomputes the seed slices of its task from the descriptor,
//! runs one thread per slice and the seeds of a slice one after another.
//! Every seed writes only its own files, so threads share nothing.
//!
//! With a `tempdir` the simulation writes into a per-seed staging directory
//! on the node, and the finished trajectory and state vector are moved into
//! `traj/` afterwards.

pub mod descriptor;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use crate::utils::ensure_dir;
pub use descriptor::JobDescriptor;

/// Environment variable holding the array task index.
pub const TASK_ID_ENV: &str = "SGE_TASK_ID";

/// Outcome of one seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Finished(u64),
    Failed { seed: u64, reason: String },
}

/// Outcomes of one array task, in thread then seed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub outcomes: Vec<SeedOutcome>,
}

impl WorkerReport {
    #[must_use]
    pub fn failed(&self) -> Vec<u64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SeedOutcome::Failed { seed, .. } => Some(*seed),
                SeedOutcome::Finished(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn finished(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, SeedOutcome::Finished(_))).count()
    }
}

/// Array task index from the scheduler environment.
///
/// # Errors
///
/// See [`parse_task_id`].
pub fn task_id_from_env() -> Result<usize> {
    parse_task_id(std::env::var(TASK_ID_ENV).ok().as_deref())
}

/// Parse an array task index.
///
/// SGE sets `SGE_TASK_ID=undefined` for jobs without `-t`; that is task 1.
///
/// # Errors
///
/// Fails when the value is missing or not a positive integer.
pub fn parse_task_id(raw: Option<&str>) -> Result<usize> {
    let raw = raw
        .map(str::trim)
        .ok_or_else(|| anyhow::anyhow!("{TASK_ID_ENV} is not set; pass --subjob explicitly"))?;
    if raw == "undefined" {
        return Ok(1);
    }
    raw.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| anyhow::anyhow!("{TASK_ID_ENV}={raw} is not a valid task index"))
}

/// Read a descriptor written at submission time.
///
/// # Errors
///
/// Fails when the file cannot be read or is not a descriptor.
pub fn load_descriptor(path: &Path) -> Result<JobDescriptor> {
    crate::utils::read_json_file(path).with_context(|| format!("Invalid job descriptor {}", path.display()))
}

/// Run every seed of array task `subjob`.
///
/// A failing simulation is recorded in the report and the thread moves on
/// to its next seed; only infrastructure failures (directories, staging)
/// abort the task.
///
/// # Errors
///
/// Fails when output directories cannot be created or staged files cannot
/// be moved into place.
pub async fn run_subjob(descriptor: &JobDescriptor, subjob: usize) -> Result<WorkerReport> {
    let slices = descriptor.seeds.subjob_slices(subjob);
    if slices.is_empty() {
        tracing::warn!(
            "Task {subjob} has no seeds ({} seeds, {} per task)",
            descriptor.seeds.seeds.len(),
            descriptor.seeds.seeds_per_subjob()
        );
        return Ok(WorkerReport::default());
    }

    ensure_dir(&descriptor.layout().traj_dir())?;
    tracing::info!(
        "Task {subjob}: {} thread(s), seeds {:?}",
        slices.len(),
        slices.iter().flat_map(|s| s.iter()).collect::<Vec<_>>()
    );

    let threads = slices.into_iter().map(|slice| run_slice(descriptor, slice));
    let outcomes = try_join_all(threads).await?.into_iter().flatten().collect();
    Ok(WorkerReport {
        outcomes,
    })
}

async fn run_slice(descriptor: &JobDescriptor, seeds: &[u64]) -> Result<Vec<SeedOutcome>> {
    let mut outcomes = Vec::with_capacity(seeds.len());
    for &seed in seeds {
        outcomes.push(run_seed(descriptor, seed).await?);
    }
    Ok(outcomes)
}

async fn run_seed(descriptor: &JobDescriptor, seed: u64) -> Result<SeedOutcome> {
    let layout = descriptor.layout();
    let staging = descriptor.tempdir.as_ref().map(|dir| staging_dir(dir, &descriptor.basename, seed));
    let output_dir = match &staging {
        Some(dir) => {
            ensure_dir(dir)?;
            dir.clone()
        }
        None => layout.traj_dir(),
    };

    let command = descriptor.command(seed, &output_dir);
    tracing::debug!("seed {seed}: {}", command.join(" "));

    let status = Command::new(&command[0])
        .args(&command[1..])
        .current_dir(&descriptor.ensemble)
        .stdin(Stdio::null())
        .status()
        .await;

    let outcome = match status {
        Ok(status) if status.success() => SeedOutcome::Finished(seed),
        Ok(status) => SeedOutcome::Failed {
            seed,
            reason: format!("{} exited with {status}", descriptor.script),
        },
        Err(e) => SeedOutcome::Failed {
            seed,
            reason: format!("failed to start {}: {e}", descriptor.script),
        },
    };

    if let SeedOutcome::Failed { reason, .. } = &outcome {
        tracing::warn!("seed {seed}: {reason}");
    }

    if let Some(dir) = staging {
        if outcome == SeedOutcome::Finished(seed) {
            let trajectory = layout.trajectory(&descriptor.basename, seed);
            let statevector = layout.statevector(&descriptor.basename, seed);
            for target in [trajectory, statevector] {
                if let Some(name) = target.file_name() {
                    move_file(&dir.join(name), &target).await?;
                }
            }
        }
        if let Err(e) = fs::remove_dir_all(&dir).await {
            tracing::debug!("Could not remove staging directory {}: {e}", dir.display());
        }
    }

    Ok(outcome)
}

fn staging_dir(tempdir: &Path, basename: &str, seed: u64) -> PathBuf {
    tempdir.join(format!("{basename}-{seed}-{}", std::process::id()))
}

/// Move `from` to `to`, copying when they live on different filesystems.
/// A missing source is not an error; not every simulation writes a state vector.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if !fs::try_exists(from).await.unwrap_or(false) {
        tracing::debug!("{} was not produced", from.display());
        return Ok(());
    }
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).await.with_context(|| format!("Failed to remove {}", from.display()))?;
    Ok(())
}
