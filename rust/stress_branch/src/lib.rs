// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Branch misprediction stressor
//!
//! A CPU workload whose only job is to defeat the branch-target predictor.
//! It executes a long, pseudo-randomly ordered chain of indirect calls among
//! 1024 otherwise empty targets. A fast deterministic generator picks each
//! next target; a single "gate" target counts work and checks whether the
//! host wants the run to stop.
//!
//! Everything around the loop (worker lifecycle, option parsing, ops and
//! time caps, reporting) belongs to the host. The host talks to the
//! stressor through [`StressContext`] and launches it through the
//! [`StressorInfo`] descriptor, [`STRESS_BRANCH_INFO`].
//!
//! Each run owns its own generator state. The node table is static and
//! read-only, so any number of instances can run concurrently on different
//! threads without sharing anything but what the host hands them.

mod context;
pub use context::ProcState;
pub use context::StressContext;

mod error;
pub use error::SetupError;

pub mod lcg;
pub use lcg::Lcg;

pub mod table;
pub use table::DispatchTable;
pub use table::GATE;
pub use table::NR_NODES;

mod engine;
pub use engine::stress_branch;
pub use engine::Engine;
pub use engine::EngineState;

mod info;
pub use info::stress_not_implemented;
pub use info::Help;
pub use info::StressClass;
pub use info::StressExit;
pub use info::Stressor;
pub use info::StressorInfo;
pub use info::STRESS_BRANCH_INFO;
