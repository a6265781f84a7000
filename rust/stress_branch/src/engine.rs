// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use log::debug;

use crate::context::ProcState;
use crate::context::StressContext;
use crate::info::StressExit;
use crate::lcg::Lcg;
use crate::table::DispatchTable;
use crate::table::Walker;
use crate::table::GATE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Exit,
}

/// Drives the dispatch chain for one stressor instance.
///
/// The engine starts on the gate and keeps hopping until the gate sees the
/// host's stop predicate go false. Stop requests are therefore only noticed
/// when the chain comes back to index 0, never mid-chain.
#[derive(Debug)]
pub struct Engine {
    table: DispatchTable,
    lcg: Lcg,
    state: EngineState,
}

impl Engine {
    pub fn new(table: DispatchTable) -> Self {
        Self::with_generator(table, Lcg::default())
    }

    pub fn with_generator(table: DispatchTable, lcg: Lcg) -> Self {
        Self {
            table,
            lcg,
            state: EngineState::Running,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Generator state, as left by the last hop of a finished run.
    pub fn seed(&self) -> u32 {
        self.lcg.seed()
    }

    /// Run the chain to completion. `Exit` is terminal; running an exited
    /// engine again does nothing.
    pub fn run(&mut self, ctx: &mut dyn StressContext) {
        if self.state == EngineState::Exit {
            return;
        }

        ctx.set_proc_state(ProcState::Run);

        let table = self.table;
        let mut walker = Walker { lcg: self.lcg, ctx };
        let mut idx = GATE;
        while let Some(next) = table.dispatch(idx, &mut walker) {
            idx = next;
        }
        self.lcg = walker.lcg;
        self.state = EngineState::Exit;

        walker.ctx.set_proc_state(ProcState::Deinit);
    }
}

/// Stressor entry point: force branch-target mispredictions until the host
/// says stop.
pub fn stress_branch(ctx: &mut dyn StressContext) -> StressExit {
    let table = match DispatchTable::build(&*ctx) {
        Ok(table) => table,
        Err(e) => {
            debug!("branch: {}", e);
            return StressExit::NotImplemented;
        }
    };

    let mut engine = Engine::new(table);
    engine.run(ctx);
    StressExit::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Budget {
        counter: u64,
        max_ops: u64,
        states: Vec<ProcState>,
    }

    impl StressContext for Budget {
        fn inc_counter(&mut self) {
            self.counter += 1;
        }

        fn keep_stressing(&self) -> bool {
            self.counter < self.max_ops
        }

        fn set_proc_state(&mut self, state: ProcState) {
            self.states.push(state);
        }
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_single_gate_visit() {
        let mut ctx = Budget {
            max_ops: 1,
            ..Default::default()
        };
        let table = DispatchTable::build(&ctx).unwrap();
        let mut engine = Engine::new(table);
        assert_eq!(engine.state(), EngineState::Running);

        engine.run(&mut ctx);

        // The very first gate visit counts and then stops before any draw.
        assert_eq!(ctx.counter, 1);
        assert_eq!(engine.state(), EngineState::Exit);
        assert_eq!(engine.seed(), crate::lcg::LCG_SEED);
        assert_eq!(ctx.states, vec![ProcState::Run, ProcState::Deinit]);
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_ops_budget() {
        let mut ctx = Budget {
            max_ops: 64,
            ..Default::default()
        };
        assert_eq!(stress_branch(&mut ctx), StressExit::Success);
        assert_eq!(ctx.counter, 64);
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_exit_is_terminal() {
        let mut ctx = Budget {
            max_ops: 3,
            ..Default::default()
        };
        let mut engine = Engine::new(DispatchTable::build(&ctx).unwrap());
        engine.run(&mut ctx);
        let seed = engine.seed();

        ctx.max_ops = 100;
        engine.run(&mut ctx);
        assert_eq!(ctx.counter, 3);
        assert_eq!(engine.seed(), seed);
        assert_eq!(ctx.states.len(), 2);
    }

    #[test]
    #[cfg(not(feature = "indirect-dispatch"))]
    fn test_entry_without_dispatch() {
        let mut ctx = Budget {
            max_ops: 64,
            ..Default::default()
        };
        assert_eq!(stress_branch(&mut ctx), StressExit::NotImplemented);
        assert_eq!(ctx.counter, 0);
        assert!(ctx.states.is_empty());
    }
}
