//! Test utilities shared by unit and integration tests.
//!
//! Available to integration tests through the `test-utils` feature (enabled
//! by the crate's own dev-dependency).

pub mod fixtures;

pub use fixtures::{SweepFixture, TrajectoryFixture};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialise tracing for tests once per process.
///
/// With `Some(level)` that level is used; otherwise `RUST_LOG` is honoured
/// and nothing is logged when it is unset.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
