//! Worker failure specs
//!
//! Each failure maps to the exit code operators script against.

use crate::prelude::*;

#[test]
fn unreachable_master_exits_42() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 8, ""));

    temp.brood()
        .arg("worker")
        .arg(&run)
        .args(&["--master", "127.0.0.1:1"])
        .exits_with(42)
        .stderr_has("Could not reach the master")
        .stderr_has("broodd <run.toml>");
}

#[test]
fn wrong_key_exits_27() {
    let temp = Project::empty();
    let master = temp.file("master.toml", &master_run_file(4, 8, "[auth]\nkey = \"alpha\"\n"));
    let worker = temp.file("worker.toml", &master_run_file(4, 8, "[auth]\nkey = \"beta\"\n"));
    let daemon = temp.serve(&master);

    temp.brood()
        .arg("worker")
        .arg(&worker)
        .args(&["--master", &daemon.addr])
        .exits_with(27)
        .stderr_has("refused to register")
        .stderr_has("wrong key");
}

#[test]
fn invalid_run_file_exits_2_before_connecting() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 8, "[chunks]\nno_proxies = 0\n"));

    temp.brood()
        .arg("worker")
        .arg(&run)
        .exits_with(2)
        .stderr_has("chunks.no_proxies");
}
