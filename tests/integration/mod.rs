//! Integration test suite for teazer
//!
//! End-to-end tests that drive the `teazer` binary. Submission is exercised
//! in dry-run mode and against a fake `qsub` on `PATH`, so no cluster is
//! needed.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **config_layers**: global and per-script default layers
//! - **dry_run**: plan listings, selectors, subsets and dependencies
//! - **errors**: configuration errors are fatal and write nothing
//! - **resume**: finished seeds are skipped, `status` reports them
//! - **cluster**: submission through a fake `qsub` and node-side workers

mod cluster;
mod common;
mod config_layers;
mod dry_run;
mod errors;
mod resume;
