//! Per-ensemble job graphs.
//!
//! An ensemble runs up to three stages:
//!
//! ```text
//! [--depend ID] → simulate (array of sub-jobs) → average → postprocess
//! ```
//!
//! `average` waits for every `simulate` sub-job; `postprocess` waits for
//! `average`, or for `simulate` when averaging is disabled. An external
//! predecessor given with `--depend` is attached to the first stage present.
//! Stage selectors restrict the graph to re-running `average` or
//! `postprocess` alone on existing data.
//!
//! Ordering is only expressed as scheduler dependencies; nothing here waits.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::SweepConfig;
use crate::core::TeazerError;
use crate::engine::Ensemble;

/// One node of the per-ensemble chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Simulate,
    Average,
    Postprocess,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simulate => "simulate",
            Self::Average => "average",
            Self::Postprocess => "postprocess",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stages a submission builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageSelector {
    /// The full chain
    #[default]
    All,
    /// Only `average`, against existing trajectories
    AverageOnly,
    /// Only `postprocess`, against existing averages
    PostprocessOnly,
}

impl StageSelector {
    #[must_use]
    pub const fn includes(self, stage: Stage) -> bool {
        matches!(
            (self, stage),
            (Self::All, _)
                | (Self::AverageOnly, Stage::Average)
                | (Self::PostprocessOnly, Stage::Postprocess)
        )
    }
}

/// Something a stage waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Scheduler job id supplied by the user
    External(String),
    /// Another stage of the same ensemble
    Stage(Stage),
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External(id) => write!(f, "job {id}"),
            Self::Stage(stage) => write!(f, "{stage}"),
        }
    }
}

/// A stage ready to be handed to a scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageJob {
    pub stage: Stage,
    /// Scheduler job name
    pub name: String,
    /// Program and arguments run on the node
    pub command: Vec<String>,
    /// Scheduler log file (may contain scheduler placeholders)
    pub log: PathBuf,
    /// Number of array tasks, for `simulate`
    pub array_size: Option<usize>,
    pub dependencies: Vec<Dependency>,
}

impl StageJob {
    /// One-line description used by dry runs.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!("{:<11} {}", self.stage.as_str(), self.command.join(" "));
        if let Some(size) = self.array_size {
            text.push_str(&format!(" [tasks 1-{size}]"));
        }
        if !self.dependencies.is_empty() {
            let deps: Vec<String> = self.dependencies.iter().map(ToString::to_string).collect();
            text.push_str(&format!(" (after {})", deps.join(", ")));
        }
        text
    }
}

/// Ordered stages of one ensemble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    /// Ensemble directory
    pub ensemble: PathBuf,
    /// Stages in dependency order
    pub stages: Vec<StageJob>,
}

impl JobPlan {
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageJob> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!("{}\n", self.ensemble.display());
        for stage in &self.stages {
            text.push_str(&format!("  {}\n", stage.describe()));
        }
        text
    }
}

/// Builds [`JobPlan`]s for planned ensembles.
pub struct JobGraphBuilder<'a> {
    config: &'a SweepConfig,
    selector: StageSelector,
    depend: Option<String>,
    worker: Vec<String>,
}

impl<'a> JobGraphBuilder<'a> {
    /// Create a builder.
    ///
    /// `worker` is the program prefix that runs a job descriptor on a node,
    /// e.g. `["/usr/bin/teazer", "worker"]`.
    ///
    /// # Errors
    ///
    /// Returns [`TeazerError::InvalidValue`] when the selector asks for a
    /// stage the configuration does not define.
    pub fn new(
        config: &'a SweepConfig,
        selector: StageSelector,
        depend: Option<String>,
        worker: Vec<String>,
    ) -> Result<Self, TeazerError> {
        if selector == StageSelector::AverageOnly && !config.average {
            return Err(TeazerError::InvalidValue {
                key: "averages".to_string(),
                raw: String::new(),
                reason: "--averageonly needs a non-empty [averages] section and average = true"
                    .to_string(),
            });
        }
        if selector == StageSelector::PostprocessOnly && config.postprocess.is_none() {
            return Err(TeazerError::InvalidValue {
                key: "config.postprocess".to_string(),
                raw: String::new(),
                reason: "--postprocessonly needs a postprocess command".to_string(),
            });
        }
        Ok(Self {
            config,
            selector,
            depend: depend.filter(|d| !d.trim().is_empty()),
            worker,
        })
    }

    /// Stage graph of one ensemble, or `None` when there is nothing to run.
    #[must_use]
    pub fn build(&self, ensemble: &Ensemble) -> Option<JobPlan> {
        let mut graph: DiGraph<Stage, ()> = DiGraph::new();

        let simulate = self.selector.includes(Stage::Simulate) && !ensemble.seeds.is_empty();
        if self.selector == StageSelector::All && !simulate {
            tracing::info!("{}: no seeds left to simulate, skipping", ensemble.layout.root.display());
            return None;
        }

        let wanted = [
            (Stage::Simulate, simulate),
            (Stage::Average, self.config.average && self.selector.includes(Stage::Average)),
            (
                Stage::Postprocess,
                self.config.postprocess.is_some() && self.selector.includes(Stage::Postprocess),
            ),
        ];
        let mut previous: Option<NodeIndex> = None;
        for (stage, included) in wanted {
            if !included {
                continue;
            }
            let node = graph.add_node(stage);
            if let Some(prev) = previous {
                graph.add_edge(prev, node, ());
            }
            previous = Some(node);
        }

        // The chain is acyclic by construction.
        let order = toposort(&graph, None).ok()?;

        let stages = order
            .iter()
            .enumerate()
            .map(|(position, &node)| {
                let mut dependencies: Vec<Dependency> = graph
                    .neighbors_directed(node, petgraph::Direction::Incoming)
                    .map(|pred| Dependency::Stage(graph[pred]))
                    .collect();
                if position == 0
                    && let Some(id) = &self.depend
                {
                    dependencies.push(Dependency::External(id.clone()));
                }
                self.stage_job(graph[node], ensemble, dependencies)
            })
            .collect::<Vec<_>>();

        (!stages.is_empty()).then(|| JobPlan {
            ensemble: ensemble.layout.root.clone(),
            stages,
        })
    }

    fn stage_job(&self, stage: Stage, ensemble: &Ensemble, dependencies: Vec<Dependency>) -> StageJob {
        let basename = &self.config.basename;
        let layout = &ensemble.layout;
        let log_dir = layout.log_dir();

        let (name, command, log, array_size) = match stage {
            Stage::Simulate => {
                let mut command = self.worker.clone();
                command.push(layout.descriptor(basename).display().to_string());
                (
                    format!("Job{basename}"),
                    command,
                    log_dir.join("$JOB_NAME.$JOB_ID.$TASK_ID.log"),
                    Some(ensemble.seeds.array_size()),
                )
            }
            Stage::Average => {
                let mut command = vec![self.config.average_command.clone()];
                command.extend(self.config.averages.iter().map(|(k, v)| format!("--{k}={v}")));
                command.push(format!("--datadir={}", layout.traj_dir().display()));
                command.push(format!("--outputdir={}", layout.mean_dir().display()));
                command.push(basename.clone());
                (format!("Mean{basename}"), command, log_dir.join(format!("{basename}_mean.log")), None)
            }
            Stage::Postprocess => {
                let mut command: Vec<String> = self
                    .config
                    .postprocess
                    .as_deref()
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(String::from)
                    .collect();
                command.push(layout.postprocess_request(basename).display().to_string());
                (
                    format!("Post{basename}"),
                    command,
                    log_dir.join(format!("{basename}_postprocess.log")),
                    None,
                )
            }
        };

        StageJob {
            stage,
            name,
            command,
            log,
            array_size,
            dependencies,
        }
    }
}
