// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn args(threads: Option<usize>) -> ThreaderArgs {
    ThreaderArgs {
        config: PathBuf::from("run.toml"),
        master: None,
        threads,
        history: None,
    }
}

fn run_file(chunks: &str) -> RunConfig {
    RunConfig::parse(&format!(
        "[job]\nkind = \"master\"\npool_size = 6\nglob_opt_iterations = 20\n\n[chunks]\n{}",
        chunks
    ))
    .unwrap()
}

#[test]
fn chunk_settings_come_from_the_run_file() {
    let config = run_file("max_tasks_per_chunk = 7\nmax_individuals_exchanged_per_sync = 3\n");
    let backend = backend_config(&args(Some(2)), &config);

    assert_eq!(backend.threads, 2);
    assert_eq!(backend.max_tasks, 7);
    assert_eq!(backend.max_exchange, Some(3));
    assert_eq!(backend.max_contact_attempts, ThreadedConfig::default().max_contact_attempts);
}

#[test]
fn threads_default_to_the_core_count() {
    let backend = backend_config(&args(None), &run_file(""));

    assert_eq!(backend.threads, ThreadedConfig::default().threads);
    assert_eq!(backend.max_exchange, None);
}
