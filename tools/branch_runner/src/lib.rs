// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Reference host for the branch stressor: spawns workers, enforces ops and
//! time caps, and reports bogo-ops.

pub mod report;
pub use report::RunReport;

pub mod worker;
pub use worker::PoolConfig;
pub use worker::WorkerArgs;
pub use worker::WorkerPool;
pub use worker::WorkerResult;
