// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

/// Reasons the dispatch table could not be set up. All of them are reported
/// before the engine starts running; nothing can fail afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("indirect dispatch is not supported by this build")]
    NotCompiledIn,

    #[error("host context reports no indirect dispatch capability")]
    NoCapability,
}
