//! Plan a sweep and submit its job chains.
//!
//! The whole plan (expansion, seed partitioning, resume reconciliation and
//! job graphs) is built before anything is written or submitted, so a
//! configuration error never leaves a partly submitted sweep behind. With
//! `--dryrun` the plan is printed instead and nothing touches the disk.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::load_sweep;
use crate::engine::{Ensemble, PlanOptions, SweepPlan, select_engine};
use crate::jobs::{JobGraphBuilder, JobPlan, Stage, StageSelector};
use crate::postprocess::PostprocessRequest;
use crate::resume::FsProbe;
use crate::scheduler::{DryRunScheduler, Scheduler, SgeScheduler, submit_plan};
use crate::utils::{ProgressBar, write_json_file};
use crate::worker::JobDescriptor;

/// Plan a sweep and submit its jobs.
#[derive(Args, Debug)]
pub struct SubmitCommand {
    /// Sweep configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Two seeds and a short final time (`testrun_t`, `testrun_dt`)
    #[arg(long)]
    testrun: bool,

    /// Print the job chains instead of submitting them
    #[arg(long, visible_alias = "dry-run")]
    dryrun: bool,

    /// Sweep engine (overrides `[config] class`)
    #[arg(long, value_name = "NAME")]
    class: Option<String>,

    /// Only (re-)run the average stage on existing trajectories
    #[arg(long, conflicts_with = "postprocessonly")]
    averageonly: bool,

    /// Only (re-)run the postprocess stage
    #[arg(long)]
    postprocessonly: bool,

    /// Scheduler job id the first stage of every ensemble waits for
    #[arg(long, value_name = "ID")]
    depend: Option<String>,

    /// Restrict to a parameter subset, e.g. "kappa=0.1,0.2;eta=1"
    #[arg(long, value_name = "EXPR")]
    subset: Option<String>,
}

impl SubmitCommand {
    const fn selector(&self) -> StageSelector {
        if self.averageonly {
            StageSelector::AverageOnly
        } else if self.postprocessonly {
            StageSelector::PostprocessOnly
        } else {
            StageSelector::All
        }
    }

    pub async fn execute(self, progress: bool) -> Result<()> {
        let config = load_sweep(&self.config).await?;
        let engine = select_engine(self.class.as_deref(), &config)?;
        tracing::debug!("Using engine '{}'", engine.name());

        let options = PlanOptions {
            testrun: self.testrun,
            subset: self.subset.clone(),
        };
        let plan = engine.plan(&config, &options, &FsProbe)?;

        let builder =
            JobGraphBuilder::new(&plan.config, self.selector(), self.depend.clone(), worker_command()?)?;
        let chains: Vec<(&Ensemble, JobPlan)> = plan
            .ensembles
            .iter()
            .filter_map(|ensemble| builder.build(ensemble).map(|chain| (ensemble, chain)))
            .collect();

        tracing::info!(
            "{} of {} ensembles selected, {} to submit, {} seeds",
            plan.ensembles.len(),
            plan.space.sets.len(),
            chains.len(),
            plan.seed_count()
        );

        if self.dryrun {
            return print_dry_run(&plan, &chains, engine.name()).await;
        }

        if chains.is_empty() {
            println!("{} nothing to submit", "✓".green());
            return Ok(());
        }

        let mut scheduler = SgeScheduler::new(plan.config.queue.clone())?;
        submit_all(&mut scheduler, &plan, &chains, progress).await
    }
}

/// Program prefix that runs a job descriptor on a node.
fn worker_command() -> Result<Vec<String>> {
    let exe = std::env::current_exe().context("Failed to locate the teazer executable")?;
    Ok(vec![exe.display().to_string(), "worker".to_string()])
}

/// Create the ensemble directory and the files its stages read.
fn prepare(plan: &SweepPlan, ensemble: &Ensemble, chain: &JobPlan) -> Result<()> {
    ensemble.layout.prepare(&ensemble.set)?;

    if chain.stage(Stage::Simulate).is_some() {
        let descriptor = JobDescriptor::new(&plan.config, ensemble);
        write_json_file(&ensemble.layout.descriptor(&plan.config.basename), &descriptor)?;
    }
    if chain.stage(Stage::Postprocess).is_some() {
        PostprocessRequest::new(plan, ensemble).write()?;
    }
    Ok(())
}

async fn submit_all<S: Scheduler>(
    scheduler: &mut S,
    plan: &SweepPlan,
    chains: &[(&Ensemble, JobPlan)],
    progress: bool,
) -> Result<()> {
    let bar = ProgressBar::for_run(chains.len() as u64, progress);
    bar.set_message("Submitting");

    for (ensemble, chain) in chains {
        prepare(plan, ensemble, chain)
            .with_context(|| format!("Failed to prepare {}", chain.ensemble.display()))?;
        let submitted = submit_plan(scheduler, chain)
            .await
            .with_context(|| format!("Submission stopped at {}", chain.ensemble.display()))?;

        let ids: Vec<String> = submitted.iter().map(|s| format!("{} {}", s.stage, s.job_id)).collect();
        bar.println(format!("{} {} ({})", "✓".green(), chain.ensemble.display(), ids.join(", ")));
        bar.inc(1);
    }

    bar.finish_and_clear();
    println!(
        "{} Submitted {} ensemble(s), {} seed(s)",
        "✓".green().bold(),
        chains.len(),
        plan.seed_count()
    );
    Ok(())
}

async fn print_dry_run(plan: &SweepPlan, chains: &[(&Ensemble, JobPlan)], engine: &str) -> Result<()> {
    println!(
        "{} {} ensemble(s), {} to submit, {} seed(s), engine {engine}",
        "Dry run:".cyan().bold(),
        plan.ensembles.len(),
        chains.len(),
        plan.seed_count()
    );

    let mut scheduler = DryRunScheduler::new();
    for (_, chain) in chains {
        submit_plan(&mut scheduler, chain).await?;
        print!("{}", chain.describe());
    }
    Ok(())
}
