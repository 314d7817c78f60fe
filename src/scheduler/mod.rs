//! Hand-off of job plans to a batch scheduler.
//!
//! A [`Scheduler`] receives one stage at a time together with the job ids it
//! must wait for and returns the id it assigned. [`submit_plan`] walks a
//! [`JobPlan`] in dependency order, translating stage dependencies into the
//! ids returned for earlier stages. A failed stage aborts the rest of its
//! chain: later stages are never submitted against a predecessor that does
//! not exist.

pub mod dry_run;
pub mod sge;

use std::collections::BTreeMap;

use crate::core::TeazerError;
use crate::jobs::{Dependency, JobPlan, Stage, StageJob};

pub use dry_run::DryRunScheduler;
pub use sge::SgeScheduler;

/// Something that accepts stage jobs.
#[allow(async_fn_in_trait)]
pub trait Scheduler {
    /// Submit `job`, holding it until every job in `holds` has finished.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::SchedulerSubmission`] when the job is rejected.
    async fn submit(&mut self, job: &StageJob, holds: &[String]) -> Result<String, TeazerError>;
}

/// A stage accepted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub stage: Stage,
    pub job_id: String,
}

/// Submit every stage of `plan` in order.
///
/// # Errors
///
/// Returns the first submission error; stages after the failed one are not
/// submitted.
pub async fn submit_plan<S: Scheduler>(
    scheduler: &mut S,
    plan: &JobPlan,
) -> Result<Vec<Submission>, TeazerError> {
    let mut ids: BTreeMap<Stage, String> = BTreeMap::new();
    let mut submitted = Vec::with_capacity(plan.stages.len());

    for job in &plan.stages {
        let holds = job
            .dependencies
            .iter()
            .map(|dependency| match dependency {
                Dependency::External(id) => Ok(id.clone()),
                Dependency::Stage(stage) => {
                    ids.get(stage).cloned().ok_or_else(|| TeazerError::SchedulerSubmission {
                        stage: job.stage.to_string(),
                        target: plan.ensemble.display().to_string(),
                        reason: format!("predecessor stage {stage} was not submitted"),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let job_id = scheduler.submit(job, &holds).await?;
        tracing::info!("{}: submitted {} as job {job_id}", plan.ensemble.display(), job.stage);

        ids.insert(job.stage, job_id.clone());
        submitted.push(Submission {
            stage: job.stage,
            job_id,
        });
    }

    Ok(submitted)
}
