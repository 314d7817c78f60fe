//! teazer - resumable parameter sweeps for trajectory simulations
//!
//! A sweep configuration names a simulation executable, a seed range and a
//! set of parameters, some of them ranges. teazer expands it into
//! independent ensembles (one parameter assignment each), gives every
//! ensemble its own output directory, and submits per ensemble a chain of
//! cluster jobs: `simulate` (an array job over the seeds), `average` and
//! `postprocess`. Before submitting it looks at output of earlier runs and
//! drops seeds that are already finished, so running the same submission
//! twice does no work twice.
//!
//! # Pipeline
//!
//! ```text
//! config ─▶ sweep (ranges, references, groups) ─▶ seeds ─▶ layout
//!        ─▶ resume (reconcile with disk) ─▶ jobs (stage graph) ─▶ scheduler
//! ```
//!
//! Planning is synchronous and writes nothing; the submit command creates
//! directories and descriptors only once the whole plan exists.
//!
//! # Modules
//!
//! ## Planning
//! - [`sweep`] - Range expansion, references, grouped products and subsets
//! - [`seeds`] - Seed lists and their partitioning into array tasks
//! - [`layout`] - Ensemble directories and file names
//! - [`resume`] - Classification of seeds against existing output
//! - [`jobs`] - Per-ensemble stage graphs
//! - [`engine`] - Named planning strategies and the planning pipeline
//!
//! ## Execution
//! - [`scheduler`] - SGE submission and dry runs
//! - [`worker`] - Node-side execution of array tasks
//! - [`postprocess`] - Request handed to the postprocess stage
//!
//! ## Supporting Modules
//! - [`config`] - Layered TOML configuration
//! - [`core`] - Error types and user-facing error rendering
//! - [`utils`] - File, platform and progress helpers
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod jobs;
pub mod layout;
pub mod postprocess;
pub mod resume;
pub mod scheduler;
pub mod seeds;
pub mod sweep;
pub mod utils;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
