//! Node-side entry point, started by the scheduler for every array task.

use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

use crate::worker::{load_descriptor, run_subjob, task_id_from_env};

/// Run one array task of an ensemble.
#[derive(Args, Debug)]
pub struct WorkerCommand {
    /// Job descriptor written at submission time
    #[arg(value_name = "DESCRIPTOR")]
    descriptor: PathBuf,

    /// Array task index (defaults to $SGE_TASK_ID)
    #[arg(long, value_name = "N")]
    subjob: Option<usize>,
}

impl WorkerCommand {
    pub async fn execute(self) -> Result<()> {
        let subjob = match self.subjob {
            Some(n) => n,
            None => task_id_from_env()?,
        };
        let descriptor = load_descriptor(&self.descriptor)?;

        let report = run_subjob(&descriptor, subjob).await?;
        let failed = report.failed();
        if !failed.is_empty() {
            bail!(
                "{} of {} seed(s) failed in task {subjob}: {failed:?}",
                failed.len(),
                report.outcomes.len()
            );
        }
        tracing::info!("Task {subjob}: {} seed(s) finished", report.finished());
        Ok(())
    }
}
