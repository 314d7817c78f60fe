//! Configuration errors are reported with the offending key and stop the
//! run before anything is written or submitted.

use predicates::prelude::*;
use teazer_cli::test_utils::SweepFixture;

use crate::common::Workspace;

#[test]
fn test_cyclic_reference_is_fatal() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1:2")
        .basedir(&ws.data())
        .parameter("a", "%(b)s")
        .parameter("b", "%(a)s")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .args(["submit"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cyclic parameter reference"))
        .stderr(predicate::str::contains("a = '%(b)s'"));
    assert_eq!(ws.data_entries(), 0);
}

#[test]
fn test_malformed_range_names_key_and_value() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1")
        .basedir(&ws.data())
        .parameter("kappa", "0.1:0:1")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'kappa'"))
        .stderr(predicate::str::contains("0.1:0:1"));
}

#[test]
fn test_group_length_mismatch() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1")
        .basedir(&ws.data())
        .parameter("x", "1;2;3")
        .parameter("y", "1;2")
        .section("[groups]\npair = \"x;y\"")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("group 'pair'"))
        .stderr(predicate::str::contains("x=3, y=2"))
        .stderr(predicate::str::contains("x = '1;2;3', y = '1;2'"));
}

#[test]
fn test_duplicate_seed() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1:3,2").basedir(&ws.data()).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate seed 2"));
}

#[test]
fn test_unknown_engine_suggests_name() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1").basedir(&ws.data()).write_to(ws.path()).unwrap();

    ws.teazer()
        .args(["submit", "--dryrun", "--class", "generc"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown sweep engine 'generc'"))
        .stderr(predicate::str::contains("Did you mean: generic"));
}

#[test]
fn test_invalid_toml_names_file() {
    let ws = Workspace::new();
    let sweep = ws.path().join("broken.toml");
    std::fs::write(&sweep, "[config\nscript = \"ring\"\n").unwrap();

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn test_missing_qsub_writes_nothing() {
    let ws = Workspace::new();
    let sweep = SweepFixture::new("ring", "1:2")
        .basedir(&ws.data())
        .parameter("T", "1")
        .write_to(ws.path())
        .unwrap();
    let empty_path = ws.path().join("empty-bin");
    std::fs::create_dir_all(&empty_path).unwrap();

    ws.teazer()
        .env("PATH", &empty_path)
        .args(["submit"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("qsub"));
    assert_eq!(ws.data_entries(), 0);
}
