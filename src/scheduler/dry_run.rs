//! Scheduler that accepts everything and runs nothing.

use super::Scheduler;
use crate::core::TeazerError;
use crate::jobs::StageJob;

/// A stage recorded by [`DryRunScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSubmission {
    pub job: StageJob,
    pub holds: Vec<String>,
    pub job_id: String,
}

/// Records submissions and hands out placeholder ids (`dry-1`, `dry-2`, ...).
#[derive(Debug, Clone, Default)]
pub struct DryRunScheduler {
    submissions: Vec<DryRunSubmission>,
}

impl DryRunScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything submitted so far, in order.
    #[must_use]
    pub fn submissions(&self) -> &[DryRunSubmission] {
        &self.submissions
    }
}

impl Scheduler for DryRunScheduler {
    async fn submit(&mut self, job: &StageJob, holds: &[String]) -> Result<String, TeazerError> {
        let job_id = format!("dry-{}", self.submissions.len() + 1);
        tracing::debug!("dry run: {} as {job_id}", job.describe());
        self.submissions.push(DryRunSubmission {
            job: job.clone(),
            holds: holds.to_vec(),
            job_id: job_id.clone(),
        });
        Ok(job_id)
    }
}
