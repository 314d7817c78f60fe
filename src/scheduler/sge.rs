//! Sun Grid Engine adapter.
//!
//! Every stage becomes one `qsub` call:
//!
//! ```text
//! qsub -terse -o <log> -N <name> [-t 1-<tasks>] [-hold_jid <ids>] \
//!      -b y -v PYTHONPATH -v PATH -q <queue> -m n -j yes <command...>
//! ```
//!
//! With `-terse` qsub prints only the job id, for arrays followed by the
//! task range (`4711.1-10:1`); the id is the text before the first `.`.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::Scheduler;
use crate::core::TeazerError;
use crate::jobs::StageJob;
use crate::utils::command_exists;

/// Submission program.
pub const QSUB: &str = "qsub";

/// Upper bound for a single `qsub` call.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variables exported to every job.
const EXPORTED_ENV: &[&str] = &["PYTHONPATH", "PATH"];

#[derive(Debug, Clone)]
pub struct SgeScheduler {
    program: String,
    queue: String,
    timeout: Duration,
}

impl SgeScheduler {
    /// Adapter for `queue`, using `qsub` from `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::SchedulerSubmission`] when `qsub` is not installed.
    pub fn new(queue: impl Into<String>) -> Result<Self, TeazerError> {
        if !command_exists(QSUB) {
            return Err(TeazerError::SchedulerSubmission {
                stage: "setup".to_string(),
                target: QSUB.to_string(),
                reason: "qsub was not found in PATH; use --dryrun to inspect the plan".to_string(),
            });
        }
        Ok(Self::with_program(QSUB, queue))
    }

    /// Adapter calling `program` instead of `qsub`.
    #[must_use]
    pub fn with_program(program: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            queue: queue.into(),
            timeout: SUBMIT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments of the `qsub` call for `job`.
    #[must_use]
    pub fn arguments(&self, job: &StageJob, holds: &[String]) -> Vec<String> {
        let mut args = vec![
            "-terse".to_string(),
            "-o".to_string(),
            job.log.display().to_string(),
            "-N".to_string(),
            job.name.clone(),
        ];
        if let Some(size) = job.array_size {
            args.push("-t".to_string());
            args.push(format!("1-{size}"));
        }
        if !holds.is_empty() {
            args.push("-hold_jid".to_string());
            args.push(holds.join(","));
        }
        args.extend(["-b", "y"].map(String::from));
        for var in EXPORTED_ENV {
            args.push("-v".to_string());
            args.push((*var).to_string());
        }
        args.extend(["-q".to_string(), self.queue.clone()]);
        args.extend(["-m", "n", "-j", "yes"].map(String::from));
        args.extend(job.command.iter().cloned());
        args
    }
}

/// Job id from `qsub -terse` output.
#[must_use]
pub fn parse_job_id(stdout: &str) -> Option<String> {
    let id = stdout.trim().split('.').next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

impl Scheduler for SgeScheduler {
    async fn submit(&mut self, job: &StageJob, holds: &[String]) -> Result<String, TeazerError> {
        let args = self.arguments(job, holds);
        let failed = |reason: String| TeazerError::SchedulerSubmission {
            stage: job.stage.to_string(),
            target: job.name.clone(),
            reason,
        };

        tracing::debug!(target: "qsub", "Executing command: {} {}", self.program, args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| failed(format!("failed to run {}: {e}", self.program)))?,
            Err(_) => {
                tracing::warn!(
                    target: "qsub",
                    "Command timed out after {} seconds: {}",
                    self.timeout.as_secs(),
                    self.program
                );
                return Err(failed(format!("{} timed out after {} seconds", self.program, self.timeout.as_secs())));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            tracing::debug!(target: "qsub", "Command failed with exit code: {:?}", output.status.code());
            let reason = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(failed(reason));
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(target: "qsub", "{}", stderr.trim());
        }

        parse_job_id(&stdout).ok_or_else(|| failed(format!("no job id in output '{}'", stdout.trim())))
    }
}
