//! Run file validation specs

use crate::prelude::*;

#[test]
fn valid_run_file_is_summarized() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(6, 40, ""));

    temp.brood()
        .arg("check-config")
        .arg(&run)
        .passes()
        .stdout_has("run.toml: ok")
        .stdout_has("Kind: master")
        .stdout_has("Pool: 6 individuals, 40 optimization steps");
}

#[test]
fn json_format_emits_the_summary_fields() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(6, 40, ""));

    let out = temp
        .brood()
        .args(&["--format", "json", "check-config"])
        .arg(&run)
        .passes();
    let json: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();

    similar_asserts::assert_eq!(json["kind"], "master");
    similar_asserts::assert_eq!(json["pool_size"], 6);
}

#[test]
fn invalid_field_fails_with_bad_arguments() {
    let temp = Project::empty();
    let run = temp.file("run.toml", &master_run_file(0, 40, ""));

    temp.brood()
        .arg("check-config")
        .arg(&run)
        .exits_with(2)
        .stderr_has("job.pool_size");
}

#[test]
fn proxy_without_upstream_is_rejected() {
    let temp = Project::empty();
    let run = temp.file(
        "run.toml",
        "[job]\nkind = \"proxy\"\npool_size = 4\nglob_opt_iterations = 8\n",
    );

    temp.brood()
        .arg("check-config")
        .arg(&run)
        .exits_with(2)
        .stderr_has("network.upstream");
}

#[test]
fn missing_seed_folder_is_caught_before_startup() {
    let temp = Project::empty();
    let run = temp.file(
        "run.toml",
        "[job]\nkind = \"master\"\npool_size = 4\nglob_opt_iterations = 8\nseed_folder = \"no-such-seeds\"\n",
    );

    temp.brood()
        .arg("check-config")
        .arg(&run)
        .exits_with(2)
        .stderr_has("Invalid run file");
}

#[test]
fn missing_run_file_fails() {
    let temp = Project::empty();

    temp.brood()
        .args(&["check-config", "absent.toml"])
        .exits_with(2)
        .stderr_has("absent.toml");
}
