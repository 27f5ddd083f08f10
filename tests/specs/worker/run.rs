//! End-to-end run specs
//!
//! A master served by broodd and driven to completion by brood clients.

use crate::prelude::*;

#[test]
fn single_worker_completes_a_master_run() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 8, ""));
    let mut daemon = temp.serve(&run);

    temp.brood()
        .arg("worker")
        .arg(&run)
        .args(&["--master", &daemon.addr])
        .passes()
        .stdout_has("finished after 12 tasks");

    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(0));
    assert!(temp.path().join("out/initial_pool.json").is_file());
    assert!(temp.path().join("out/final_pool.json").is_file());
    similar_asserts::assert_eq!(temp.read("out/history.jsonl").lines().count(), 8);
}

#[test]
fn worker_reports_json() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(2, 3, ""));
    let mut daemon = temp.serve(&run);

    let out = temp
        .brood()
        .args(&["--format", "json", "worker"])
        .arg(&run)
        .args(&["--master", &daemon.addr])
        .passes();
    let json: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();

    similar_asserts::assert_eq!(json["tasks_done"], 5);
    similar_asserts::assert_eq!(json["interrupted"], false);
    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(0));
}

#[test]
fn threader_completes_a_master_run() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(6, 20, "[chunks]\nmax_tasks_per_chunk = 5\n"));
    let mut daemon = temp.serve(&run);

    temp.brood()
        .arg("threader")
        .arg(&run)
        .args(&["--master", &daemon.addr, "--threads", "2"])
        .arg("--history")
        .arg(temp.path().join("local-history.jsonl"))
        .passes()
        .stdout_has("Finished after 26 tasks");

    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(0));
    similar_asserts::assert_eq!(temp.read("local-history.jsonl").lines().count(), 20);
}

#[test]
fn shared_key_from_the_run_file_is_accepted() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(2, 2, "[auth]\nkey = \"alpha\"\n"));
    let mut daemon = temp.serve(&run);

    temp.brood()
        .arg("worker")
        .arg(&run)
        .args(&["--master", &daemon.addr])
        .passes();

    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(0));
}
