//! Dry runs print the plan and leave the output tree untouched.

use predicates::prelude::*;
use teazer_cli::test_utils::SweepFixture;

use crate::common::Workspace;

fn ring(ws: &Workspace) -> SweepFixture {
    SweepFixture::new("ring", "1:4")
        .basedir(&ws.data())
        .config("cluster", "2")
        .parameter("T", "10")
        .parameter("kappa", "0.1;0.2")
}

#[test]
fn test_dry_run_lists_every_ensemble() {
    let ws = Workspace::new();
    let sweep = ring(&ws).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 ensemble(s), 2 to submit, 8 seed(s), engine generic"))
        .stdout(predicate::str::contains("kappa=0.1"))
        .stdout(predicate::str::contains("kappa=0.2"))
        .stdout(predicate::str::contains("[tasks 1-2]"))
        .stdout(predicate::str::contains("worker"));

    assert_eq!(ws.data_entries(), 0, "dry run must not write");
}

#[test]
fn test_dry_run_shows_full_chain_and_dependency() {
    let ws = Workspace::new();
    let sweep = ring(&ws)
        .config("postprocess", "\"plot --png\"")
        .section("[averages]\nexpvals = \"3,5\"")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--depend", "4711"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("(after job 4711)"))
        .stdout(predicate::str::contains("calculate_mean --expvals=3,5"))
        .stdout(predicate::str::contains("(after simulate)"))
        .stdout(predicate::str::contains("plot --png"))
        .stdout(predicate::str::contains("(after average)"));
}

#[test]
fn test_testrun_uses_two_seeds() {
    let ws = Workspace::new();
    let sweep = ring(&ws).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--testrun"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 seed(s)"))
        .stdout(predicate::str::contains("[tasks 1-1]"));
}

#[test]
fn test_subset_restricts_ensembles() {
    let ws = Workspace::new();
    let sweep = ring(&ws).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--subset", "kappa=0.2"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 ensemble(s)"))
        .stdout(predicate::str::contains("kappa=0.2"))
        .stdout(predicate::str::contains("kappa=0.1").not());
}

#[test]
fn test_grouped_parameters_vary_together() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1")
        .basedir(&ws.data())
        .config("numericsubdirs", "true")
        .parameter("deltaC", "1:3")
        .parameter("deltaA", "-1:-1:-3")
        .section("[groups]\ndetuning = [\"deltaC\", \"deltaA\"]")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 ensemble(s)"))
        .stdout(predicate::str::contains("03"));
}

#[test]
fn test_average_only_requires_averages() {
    let ws = Workspace::new();
    let sweep = ring(&ws).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--averageonly"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("averageonly"));
}
