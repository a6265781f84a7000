// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

/// Worker lifecycle states reported to the host for monitoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProcState {
    Init = 0,
    Run = 1,
    Sync = 2,
    Deinit = 3,
    Exit = 4,
    Wait = 5,
}

impl ProcState {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Init),
            1 => Some(Self::Run),
            2 => Some(Self::Sync),
            3 => Some(Self::Deinit),
            4 => Some(Self::Exit),
            5 => Some(Self::Wait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Run => "run",
            Self::Sync => "sync",
            Self::Deinit => "deinit",
            Self::Exit => "exit",
            Self::Wait => "wait",
        }
    }
}

/// Execution context handed to a stressor by its host.
///
/// The counter and the stop predicate are owned by the host, which is
/// responsible for making them safe to share with whoever else watches
/// them. The stressor only ever calls these from its own thread.
pub trait StressContext {
    /// Advance the work counter by one bogo-op. Must not fail.
    fn inc_counter(&mut self);

    /// Whether the stressor should keep going. Called once per gate visit,
    /// so it has to be cheap and free of side effects.
    fn keep_stressing(&self) -> bool;

    /// Lifecycle notification. The branch stressor only reports `Run` on
    /// loop entry and `Deinit` on loop exit.
    fn set_proc_state(&mut self, _state: ProcState) {}

    /// Capability check for indirect dispatch. Hosts running on a target
    /// where computed branches are known to be emulated can return false
    /// to get the stressor skipped.
    fn has_indirect_dispatch(&self) -> bool {
        true
    }
}
