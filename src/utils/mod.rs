//! Shared helpers
//!
//! - [`fs`] - atomic writes, directory creation and JSON files
//! - [`platform`] - path expansion and executable lookup
//! - [`progress`] - progress bars for submission

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, ensure_dir, read_json_file, write_json_file};
pub use platform::{command_exists, get_home_dir, resolve_path};
pub use progress::ProgressBar;
