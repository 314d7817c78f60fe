//! Seeds finished by earlier runs are skipped; `status` reports them.

use predicates::prelude::*;
use teazer_cli::test_utils::{SweepFixture, TrajectoryFixture};

use crate::common::Workspace;

fn sweep(ws: &Workspace) -> std::path::PathBuf {
    SweepFixture::new("ring", "1:4")
        .basedir(&ws.data())
        .parameter("T", "10")
        .parameter("kappa", "0.1;0.2")
        .write_to(ws.path())
        .unwrap()
}

#[test]
fn test_finished_ensemble_is_not_resubmitted() {
    let ws = Workspace::new();
    let sweep = sweep(&ws);
    let done = TrajectoryFixture::new(ws.data().join("kappa=0.1"), "ring");
    for seed in 1..=4 {
        done.finished(seed, 10.0).unwrap();
    }

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 ensemble(s), 1 to submit, 4 seed(s)"))
        .stdout(predicate::str::contains("kappa=0.2"))
        .stderr(predicate::str::contains("no seeds left to simulate"));
}

#[test]
fn test_status_counts_seed_states() {
    let ws = Workspace::new();
    let sweep = sweep(&ws);
    let partial = TrajectoryFixture::new(ws.data().join("kappa=0.2"), "ring");
    partial.finished(1, 10.0).unwrap();
    partial.finished(2, 4.0).unwrap();
    partial.trajectory_only(3, 10.0).unwrap();

    ws.teazer()
        .args(["status"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("complete 1  stale 1  missing 1  excluded 1"))
        .stdout(predicate::str::contains("complete 0  stale 0  missing 4  excluded 0"))
        .stdout(predicate::str::contains("Total 2 ensemble(s): complete 1  stale 1  missing 5  excluded 1"));
}

#[test]
fn test_continuation_only_submits_stale_seeds() {
    let ws = Workspace::new();
    let sweep = sweep(&ws);
    let partial = TrajectoryFixture::new(ws.data().join("kappa=0.2"), "ring");
    partial.finished(1, 10.0).unwrap();
    partial.finished(3, 5.0).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--class", "continuation"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 ensemble(s), 1 to submit, 1 seed(s), engine continuation"));
}

#[test]
fn test_compressed_output_is_rerun() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1:2")
        .basedir(&ws.data())
        .config("compress", "true")
        .parameter("T", "10")
        .write_to(ws.path())
        .unwrap();
    TrajectoryFixture::new(ws.data(), "ring").compressed(1).unwrap();

    ws.teazer()
        .args(["status"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("missing 2"));
}
