//! Daemon lifecycle specs
//!
//! Verify broodd startup, refusal and shutdown.

use crate::prelude::*;

#[test]
fn invalid_run_file_exits_with_bad_arguments() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 0, "[chunks]\nmax_tasks_per_chunk = 0\n"));

    temp.broodd()
        .arg(&run)
        .exits_with(2)
        .stderr_has("chunks.max_tasks_per_chunk");
}

#[test]
fn noop_job_exits_cleanly_and_releases_the_lock() {
    let temp = Project::empty();
    let run = temp.file("run.toml", "[job]\nkind = \"noop\"\npool_size = 1\nglob_opt_iterations = 0\n");

    let mut daemon = temp.serve(&run);

    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(0));
    assert!(!temp.path().join("out/broodd.lock").exists());
}

#[test]
fn unsupported_kind_exits_with_snafu() {
    let temp = Project::empty();
    let run = temp.file("run.toml", "[job]\nkind = \"annealing\"\npool_size = 1\nglob_opt_iterations = 0\n");

    let mut daemon = temp.serve(&run);

    similar_asserts::assert_eq!(daemon.wait(EXIT_TIMEOUT), Some(33));
}

#[test]
fn second_daemon_on_the_same_output_is_refused() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 8, ""));
    let _first = temp.serve(&run);

    temp.broodd()
        .arg(&run)
        .args(&["--listen", "127.0.0.1:0"])
        .arg("--output")
        .arg(temp.path().join("out"))
        .arg("--log-file")
        .arg(temp.path().join("second.log"))
        .exits_with(1)
        .stderr_has("lock");
}

#[test]
fn status_reports_a_fresh_master() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(4, 8, ""));
    let daemon = temp.serve(&run);

    temp.brood()
        .args(&["status", "--master", &daemon.addr])
        .passes()
        .stdout_has("Job: master (init-issuing)")
        .stdout_has("Init: 0/4 returned, 0 issued")
        .stdout_has("Healthy: yes");
}

#[test]
fn status_without_a_master_exits_with_connect_failure() {
    let temp = Project::empty();

    temp.brood()
        .args(&["status", "--master", "127.0.0.1:1"])
        .exits_with(42)
        .stderr_has("Could not reach the master at 127.0.0.1:1");
}
