// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `brood check-config` - validate a run file without starting anything

use std::path::PathBuf;

use brood_core::RunConfig;
use clap::Args;

use crate::error::BroodError;
use crate::output::ConfigView;

#[derive(Args)]
pub struct CheckArgs {
    /// Run file (TOML)
    pub config: PathBuf,
}

pub fn handle(args: &CheckArgs) -> Result<ConfigView, BroodError> {
    let invalid = |e| BroodError::invalid_run_file(&args.config, &e);
    let config = RunConfig::load(&args.config).map_err(invalid)?;
    // The seed folder is only read at startup; catch a bad one now
    config.load_seeds().map_err(invalid)?;
    Ok(ConfigView::new(args.config.clone(), &config))
}
