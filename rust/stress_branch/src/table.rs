// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Dispatch table
//!
//! 1024 control-transfer targets indexed by the generator output. Index 0 is
//! the gate, which does the bookkeeping; every other node draws the next
//! index and hands it back to the engine, which calls through the table
//! again. Each hop is therefore one indirect call to a pseudo-randomly
//! chosen target, which is what the branch-target predictor cannot follow.
//!
//! The entries are generated by `build.rs`. Every plain node is its own
//! monomorphization of `node::<N>` and feeds `N` through an optimization
//! barrier, so the bodies differ and cannot be folded into one address.
use std::hint::black_box;

use static_assertions::const_assert_eq;

use crate::context::StressContext;
use crate::error::SetupError;
use crate::lcg::Lcg;

/// Number of dispatch targets. Must match the width of the generator index.
pub const NR_NODES: usize = 1 << (32 - crate::lcg::INDEX_SHIFT);
/// Index of the gate node.
pub const GATE: usize = 0;

const NODE_MASK: usize = NR_NODES - 1;

/// State carried along the chain while the engine is running.
pub struct Walker<'a> {
    pub(crate) lcg: Lcg,
    pub(crate) ctx: &'a mut dyn StressContext,
}

/// A dispatch target. Returns the next index, or `None` to leave the chain.
pub type Node = fn(&mut Walker<'_>) -> Option<usize>;

#[inline(never)]
fn gate(w: &mut Walker<'_>) -> Option<usize> {
    w.ctx.inc_counter();
    if !w.ctx.keep_stressing() {
        return None;
    }
    Some(w.lcg.next_index())
}

#[inline(never)]
fn node<const N: usize>(w: &mut Walker<'_>) -> Option<usize> {
    let _ = black_box(N);
    Some(w.lcg.next_index())
}

include!(concat!(env!("OUT_DIR"), "/nodes.rs"));

const_assert_eq!(GENERATED_NODES, NR_NODES);

/// Read-only view of the node array, shared by every engine in the process.
#[derive(Clone, Copy)]
pub struct DispatchTable {
    nodes: &'static [Node; NR_NODES],
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("nr_nodes", &self.nodes.len())
            .finish()
    }
}

impl DispatchTable {
    /// Set up the table for a run under `ctx`. Fails if indirect dispatch
    /// was compiled out or the host says it is unavailable.
    pub fn build(ctx: &dyn StressContext) -> Result<Self, SetupError> {
        if !cfg!(feature = "indirect-dispatch") {
            return Err(SetupError::NotCompiledIn);
        }
        if !ctx.has_indirect_dispatch() {
            return Err(SetupError::NoCapability);
        }
        Ok(Self { nodes: &NODES })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Transfer control to node `idx`.
    #[inline(always)]
    pub(crate) fn dispatch(&self, idx: usize, w: &mut Walker<'_>) -> Option<usize> {
        (self.nodes[idx & NODE_MASK])(w)
    }

    /// Entry address of node `idx`.
    pub fn target(&self, idx: usize) -> usize {
        self.nodes[idx & NODE_MASK] as usize
    }

    /// Number of distinct entry addresses in the table. Anything below
    /// `NR_NODES` means the toolchain folded some node bodies together and
    /// the chain is easier to predict than intended.
    pub fn distinct_targets(&self) -> usize {
        let mut addrs: Vec<usize> = (0..self.nodes.len()).map(|i| self.target(i)).collect();
        addrs.sort_unstable();
        addrs.dedup();
        addrs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capable(bool);

    impl StressContext for Capable {
        fn inc_counter(&mut self) {}

        fn keep_stressing(&self) -> bool {
            false
        }

        fn has_indirect_dispatch(&self) -> bool {
            self.0
        }
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_table_shape() {
        let table = DispatchTable::build(&Capable(true)).unwrap();
        assert_eq!(table.len(), 1024);
        assert_eq!(NR_NODES, 1024);
        assert_eq!(table.target(GATE), gate as Node as usize);
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_targets_are_distinct() {
        let table = DispatchTable::build(&Capable(true)).unwrap();
        assert_eq!(table.distinct_targets(), NR_NODES);
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_no_capability() {
        assert_eq!(
            DispatchTable::build(&Capable(false)).unwrap_err(),
            SetupError::NoCapability
        );
    }

    #[test]
    #[cfg(feature = "indirect-dispatch")]
    fn test_plain_node_only_draws() {
        let table = DispatchTable::build(&Capable(true)).unwrap();
        let mut ctx = Capable(true);
        let mut w = Walker {
            lcg: Lcg::default(),
            ctx: &mut ctx,
        };
        let mut expected = Lcg::default();
        for idx in [1, 2, 511, 1023] {
            assert_eq!(table.dispatch(idx, &mut w), Some(expected.next_index()));
        }
    }

    #[test]
    #[cfg(not(feature = "indirect-dispatch"))]
    fn test_not_compiled_in() {
        // The build-time gate wins over whatever the host reports.
        assert_eq!(
            DispatchTable::build(&Capable(true)).unwrap_err(),
            SetupError::NotCompiledIn
        );
        assert_eq!(
            DispatchTable::build(&Capable(false)).unwrap_err(),
            SetupError::NotCompiledIn
        );
    }
}
