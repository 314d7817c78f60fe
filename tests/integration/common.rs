//! Helpers shared by the integration tests.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use teazer_cli::config::CONFIG_DIR_ENV;
use teazer_cli::utils::progress::NO_PROGRESS_ENV;

/// Scratch space with an (initially empty) default-layer directory and an
/// output root.
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("defaults")).unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        Self {
            temp,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn defaults(&self) -> PathBuf {
        self.path().join("defaults")
    }

    pub fn data(&self) -> PathBuf {
        self.path().join("data")
    }

    /// `teazer` isolated from the user's configuration and terminal.
    pub fn teazer(&self) -> Command {
        let mut cmd = Command::cargo_bin("teazer").unwrap();
        cmd.current_dir(self.path())
            .env(CONFIG_DIR_ENV, self.defaults())
            .env(NO_PROGRESS_ENV, "1")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("SGE_TASK_ID");
        cmd
    }

    /// Number of entries below the output root.
    pub fn data_entries(&self) -> usize {
        std::fs::read_dir(self.data()).unwrap().count()
    }
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
