//! Resume state of every ensemble, without submitting anything.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::load_sweep;
use crate::engine::{Ensemble, PlanOptions, select_engine};
use crate::resume::{FsProbe, SeedStatus};

const STATUSES: [SeedStatus; 4] =
    [SeedStatus::Complete, SeedStatus::Stale, SeedStatus::Missing, SeedStatus::Excluded];

/// Show the resume state of every ensemble.
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Sweep configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Sweep engine (overrides `[config] class`)
    #[arg(long, value_name = "NAME")]
    class: Option<String>,

    /// Restrict to a parameter subset
    #[arg(long, value_name = "EXPR")]
    subset: Option<String>,
}

impl StatusCommand {
    pub async fn execute(self) -> Result<()> {
        let config = load_sweep(&self.config).await?;
        let engine = select_engine(self.class.as_deref(), &config)?;
        let options = PlanOptions {
            testrun: false,
            subset: self.subset,
        };
        let plan = engine.plan(&config, &options, &FsProbe)?;

        let mut totals = [0usize; STATUSES.len()];
        for ensemble in &plan.ensembles {
            let counts = counts(ensemble);
            for (total, count) in totals.iter_mut().zip(counts) {
                *total += count;
            }
            let marker = if counts[0] == ensemble.reconciliation.records.len() {
                "✓".green()
            } else {
                "•".yellow()
            };
            println!("{marker} {}  {}", ensemble.layout.root.display(), render(counts));
        }

        println!(
            "{} {} ensemble(s): {}",
            "Total".bold(),
            plan.ensembles.len(),
            render(totals)
        );
        Ok(())
    }
}

fn counts(ensemble: &Ensemble) -> [usize; STATUSES.len()] {
    STATUSES.map(|status| ensemble.reconciliation.count(status))
}

fn render(counts: [usize; STATUSES.len()]) -> String {
    STATUSES
        .iter()
        .zip(counts)
        .map(|(status, count)| format!("{status} {count}"))
        .collect::<Vec<_>>()
        .join("  ")
}
