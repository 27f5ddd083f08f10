//! Help output specs

use crate::prelude::*;

#[test]
fn brood_help_lists_every_command() {
    let temp = Project::empty();

    temp.brood()
        .args(&["--help"])
        .passes()
        .stdout_has("worker")
        .stdout_has("threader")
        .stdout_has("status")
        .stdout_has("check-config");
}

#[test]
fn broodd_help_names_the_overrides() {
    let temp = Project::empty();

    temp.broodd()
        .args(&["--help"])
        .passes()
        .stdout_has("--listen")
        .stdout_has("--output");
}

#[test]
fn unknown_command_is_a_usage_error() {
    let temp = Project::empty();

    temp.brood().args(&["hatch"]).exits_with(2);
}
