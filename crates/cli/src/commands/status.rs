// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `brood status` - ask a running master how far along it is

use brood_core::config::DEFAULT_LISTEN;
use brood_daemon::RemoteMaster;
use clap::Args;

use crate::client::{self, ClientError};
use crate::error::BroodError;
use crate::output::StatusView;

#[derive(Args)]
pub struct StatusArgs {
    /// Master (or proxy) address
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub master: String,
}

pub fn handle(args: &StatusArgs) -> Result<StatusView, BroodError> {
    query(&args.master).map_err(|e| BroodError::explain(&e, &args.master))
}

fn query(addr: &str) -> Result<StatusView, ClientError> {
    let remote = RemoteMaster::connect(addr, client::timeout_ipc())?;
    Ok(StatusView(remote.summary()?))
}
