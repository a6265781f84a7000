// Copyright (c) The stress_branch Authors
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Index generator
//!
//! A 32-bit linear congruential generator which picks the next dispatch
//! target. Only the top 10 bits of each new state are used, which gives an
//! index in `[0, NR_NODES)`.
//!
//! The multiplier and increment satisfy the Hull-Dobell conditions (odd
//! increment, `a - 1` divisible by 4), so the state walks the full 2^32
//! period and every index, the gate included, keeps recurring.

/// LCG multiplier (0x01010101).
pub const LCG_A: u32 = 16843009;
/// LCG increment.
pub const LCG_C: u32 = 826366247;
/// Seed every engine run starts from.
pub const LCG_SEED: u32 = 123456789;
/// Number of low state bits discarded when deriving an index.
pub const INDEX_SHIFT: u32 = 22;

/// Generator state. Owned by a single engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lcg {
    seed: u32,
}

impl Default for Lcg {
    fn default() -> Self {
        Self::new(LCG_SEED)
    }
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Raw 32-bit state.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Pure transition: returns the new state and the index derived from it.
    #[inline(always)]
    pub fn step(seed: u32) -> (u32, usize) {
        let next = LCG_A.wrapping_mul(seed).wrapping_add(LCG_C);
        (next, (next >> INDEX_SHIFT) as usize)
    }

    /// Advance the state in place and return the next dispatch index.
    #[inline(always)]
    pub fn next_index(&mut self) -> usize {
        let (seed, idx) = Self::step(self.seed);
        self.seed = seed;
        idx
    }
}

/// Endless stream of dispatch indices, for replaying a trace without
/// running the engine.
impl Iterator for Lcg {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        Some(self.next_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::NR_NODES;

    #[test]
    fn test_first_draw_from_reference_seed() {
        let expected = ((LCG_SEED as u64 * LCG_A as u64 + LCG_C as u64) % (1u64 << 32)) as u32;
        assert_eq!(expected, 1988049724);

        let mut lcg = Lcg::default();
        assert_eq!(lcg.next_index(), (expected >> 22) as usize);
        assert_eq!(lcg.seed(), expected);
        assert_eq!(expected >> 22, 473);
    }

    #[test]
    fn test_reference_prefix() {
        let trace: Vec<usize> = Lcg::default().take(8).collect();
        assert_eq!(trace, vec![473, 632, 234, 188, 533, 443, 271, 525]);
    }

    #[test]
    fn test_replay_is_identical() {
        let a: Vec<usize> = Lcg::new(0xdead_beef).take(4096).collect();
        let b: Vec<usize> = Lcg::new(0xdead_beef).take(4096).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_index_range_at_extremes() {
        for seed in [0, 1, u32::MAX, u32::MAX - LCG_C, LCG_SEED, 1 << 31] {
            let (_, idx) = Lcg::step(seed);
            assert!(idx < NR_NODES, "seed {:#x} gave index {}", seed, idx);
        }
    }

    #[test]
    fn test_wrapping_transition() {
        // u32::MAX * a overflows many times over; the transition must still
        // agree with the modular definition.
        let (next, _) = Lcg::step(u32::MAX);
        let expected = ((u32::MAX as u64 * LCG_A as u64 + LCG_C as u64) % (1u64 << 32)) as u32;
        assert_eq!(next, expected);
    }

    #[test]
    fn test_every_index_reachable() {
        let mut seen = vec![false; NR_NODES];
        let mut left = NR_NODES;
        for idx in Lcg::default().take(1 << 20) {
            if !seen[idx] {
                seen[idx] = true;
                left -= 1;
                if left == 0 {
                    break;
                }
            }
        }
        assert_eq!(left, 0);
    }
}
