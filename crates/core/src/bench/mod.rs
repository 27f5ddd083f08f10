// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference payload: real-vector candidates scored by classic benchmark functions
//!
//! Lets the binaries run end to end. Any other payload plugs in through the
//! `Individual`, `Population` and `Breeder` traits.

mod backend;
mod candidate;
mod pool;

pub use backend::{BenchBackend, Objective};
pub use candidate::Candidate;
pub use pool::RankedPool;
