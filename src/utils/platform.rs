//! Host helpers: path expansion and executable lookup.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Whether `cmd` resolves to an executable on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// The user's home directory.
///
/// # Errors
///
/// Fails when no home directory can be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine home directory\n\nSet the HOME environment variable")
    })
}

/// Expand `~` and `$VAR` / `${VAR}` in a configured path.
///
/// # Errors
///
/// Fails when the path references an undefined environment variable.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Common issues:\n\
            - Undefined environment variable (e.g., $UNDEFINED_VAR)\n\
            - Invalid variable syntax (use $VAR or ${{VAR}})"
        )
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
