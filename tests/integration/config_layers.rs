//! Global and per-script default layers under `$TEAZER_CONFIG_DIR`.

use predicates::prelude::*;
use serial_test::serial;
use teazer_cli::config::{CONFIG_DIR_ENV, load_sweep};
use teazer_cli::test_utils::{SweepFixture, init_test_logging};

use crate::common::Workspace;

fn sweep(ws: &Workspace) -> SweepFixture {
    SweepFixture::new("/opt/sim/ring", "1:8").basedir(&ws.data())
}

#[test]
fn test_per_script_layer_overrides_global() {
    let ws = Workspace::new();
    std::fs::write(ws.defaults().join("config.toml"), "[config]\ncluster = 2\n").unwrap();
    let path = sweep(&ws).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[tasks 1-4]"));

    std::fs::write(ws.defaults().join("ring.toml"), "[config]\ncluster = 4\n").unwrap();
    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[tasks 1-2]"));
}

#[test]
fn test_sweep_file_wins() {
    let ws = Workspace::new();
    std::fs::write(ws.defaults().join("ring.toml"), "[config]\ncluster = 4\n").unwrap();
    let path = sweep(&ws).config("cluster", "8").write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[tasks 1-1]"));
}

#[tokio::test]
#[serial]
async fn test_load_sweep_reads_config_dir_from_env() {
    init_test_logging(None);
    let ws = Workspace::new();
    std::fs::write(ws.defaults().join("config.toml"), "[config]\nqueue = \"night.q\"\n").unwrap();
    let path = sweep(&ws).write_to(ws.path()).unwrap();

    let previous = std::env::var_os(CONFIG_DIR_ENV);
    // SAFETY: tests touching the environment are serialised
    unsafe { std::env::set_var(CONFIG_DIR_ENV, ws.defaults()) };
    let config = load_sweep(&path).await;
    match previous {
        Some(value) => unsafe { std::env::set_var(CONFIG_DIR_ENV, value) },
        None => unsafe { std::env::remove_var(CONFIG_DIR_ENV) },
    }

    let config = config.unwrap();
    assert_eq!(config.queue, "night.q");
    assert_eq!(config.basename, "ring");
}
