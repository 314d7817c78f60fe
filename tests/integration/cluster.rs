//! Submission through a fake `qsub` and node-side execution of the
//! resulting job descriptors.
#![cfg(unix)]

use predicates::prelude::*;
use std::path::{Path, PathBuf};
use teazer_cli::test_utils::SweepFixture;

use crate::common::{Workspace, write_script};

/// Install a fake `qsub` that logs its arguments and prints increasing ids.
fn install_qsub(ws: &Workspace, body: Option<&str>) -> PathBuf {
    let bin = ws.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let log = ws.path().join("qsub.log");
    let default = format!(
        "echo \"$@\" >> {log}\nn=$(wc -l < {log})\necho \"$((1000 + n)).1-9:1\"",
        log = log.display()
    );
    write_script(&bin.join("qsub"), body.unwrap_or(&default));
    bin
}

fn path_with(bin: &Path) -> String {
    format!("{}:{}", bin.display(), std::env::var("PATH").unwrap_or_default())
}

/// Simulation writing a trajectory that ends at `--T`.
fn install_simulation(ws: &Workspace) -> PathBuf {
    let path = ws.path().join("simulate.sh");
    write_script(
        &path,
        r#"t=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --T) t="$2"; shift ;;
    --o) out="$2"; shift ;;
  esac
  shift
done
printf '# t x\n0 0\n%s 1\n' "$t" > "$out"
echo state > "$out.sv""#,
    );
    path
}

#[test]
fn test_submit_writes_records_and_calls_qsub() {
    let ws = Workspace::new();
    let bin = install_qsub(&ws, None);
    let sweep = SweepFixture::new("ring", "1:4")
        .basedir(&ws.data())
        .config("cluster", "2")
        .config("queue", "\"long.q\"")
        .parameter("T", "10")
        .parameter("kappa", "0.1;0.2")
        .write_to(ws.path())
        .unwrap();

    ws.teazer()
        .env("PATH", path_with(&bin))
        .args(["submit"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("Submitted 2 ensemble(s), 8 seed(s)"))
        .stdout(predicate::str::contains("simulate 1001"));

    let ensemble = ws.data().join("kappa=0.1");
    let record = std::fs::read_to_string(ensemble.join("parameters.txt")).unwrap();
    assert!(record.contains("kappa = 0.1"));
    assert!(record.contains("T = 10"));
    assert!(ensemble.join("log/ring.job.json").is_file());
    assert!(ensemble.join("traj").is_dir());
    assert!(ensemble.join("mean").is_dir());

    let calls = std::fs::read_to_string(ws.path().join("qsub.log")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].contains("-N Jobring -t 1-2"));
    assert!(calls[0].contains("-q long.q"));
    assert!(calls[0].ends_with("ring.job.json"));
}

#[test]
fn test_average_waits_for_simulate() {
    let ws = Workspace::new();
    let bin = install_qsub(&ws, None);
    let sweep = SweepFixture::new("ring", "1:2")
        .basedir(&ws.data())
        .parameter("T", "10")
        .section("[averages]\nexpvals = \"3,5\"")
        .write_to(ws.path())
        .unwrap();

    ws.teazer().env("PATH", path_with(&bin)).args(["submit"]).arg(&sweep).assert().success();

    let calls = std::fs::read_to_string(ws.path().join("qsub.log")).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains("-N Meanring"));
    assert!(calls[1].contains("-hold_jid 1001"));
    assert!(calls[1].contains("calculate_mean --expvals=3,5"));
}

#[test]
fn test_rejected_submission_is_reported() {
    let ws = Workspace::new();
    let bin = install_qsub(&ws, Some("echo 'Unable to run job: denied' >&2\nexit 1"));
    let sweep = SweepFixture::new("ring", "1").basedir(&ws.data()).write_to(ws.path()).unwrap();

    ws.teazer()
        .env("PATH", path_with(&bin))
        .args(["submit"])
        .arg(&sweep)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to submit simulate stage"))
        .stderr(predicate::str::contains("denied"));
}

#[test]
fn test_worker_completes_the_submitted_seeds() {
    let ws = Workspace::new();
    let bin = install_qsub(&ws, None);
    let simulation = install_simulation(&ws);
    let sweep = SweepFixture::new(&simulation.display().to_string(), "1:4")
        .basedir(&ws.data())
        .config("basename", "\"ring\"")
        .config("parallel", "2")
        .parameter("T", "10")
        .write_to(ws.path())
        .unwrap();

    ws.teazer().env("PATH", path_with(&bin)).args(["submit"]).arg(&sweep).assert().success();

    let descriptor = ws.data().join("log/ring.job.json");
    ws.teazer().args(["worker"]).arg(&descriptor).args(["--subjob", "1"]).assert().success();
    ws.teazer().env("SGE_TASK_ID", "2").args(["worker"]).arg(&descriptor).assert().success();

    assert!(ws.data().join("traj/ring.out.4").is_file());
    assert!(ws.data().join("traj/ring.out.4.sv").is_file());

    ws.teazer()
        .args(["status"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("complete 4"));

    ws.teazer()
        .args(["submit", "--dryrun"])
        .arg(&sweep)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 ensemble(s), 0 to submit, 0 seed(s)"));
}

#[test]
fn test_worker_without_task_index_fails() {
    let ws = Workspace::new();
    let descriptor = ws.path().join("job.json");
    std::fs::write(&descriptor, "{}").unwrap();

    ws.teazer()
        .args(["worker"])
        .arg(&descriptor)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SGE_TASK_ID"));
}
