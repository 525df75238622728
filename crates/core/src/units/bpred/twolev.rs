//! Two-level adaptive branch direction predictor.
//!
//! A level-1 table of per-branch history registers selects into a level-2
//! table of two-bit counters. With the XOR option the history is hashed with
//! the PC before indexing level 2 (gshare-style).

use crate::common::Addr;

/// Two-level adaptive predictor.
pub struct TwoLev {
    histories: Vec<u64>,
    counters: Vec<u8>,
    hist_bits: usize,
    xor: bool,
}

impl TwoLev {
    /// Creates the predictor with `l1_size` history registers, `l2_size`
    /// counters (power of two), and `hist_bits` of history.
    pub fn new(l1_size: usize, l2_size: usize, hist_bits: usize, xor: bool) -> Self {
        Self {
            histories: vec![0; l1_size.max(1)],
            counters: vec![1; l2_size],
            hist_bits,
            xor,
        }
    }

    #[inline]
    fn l1_index(&self, pc: Addr) -> usize {
        ((pc >> 3) as usize) % self.histories.len()
    }

    /// Level-2 counter index for the branch at `pc` under its current
    /// history.
    pub fn index(&self, pc: Addr) -> usize {
        let hist = self.histories[self.l1_index(pc)];
        let raw = if self.xor { hist ^ (pc >> 3) } else { hist };
        (raw as usize) & (self.counters.len() - 1)
    }

    /// Current counter value at `idx`.
    #[inline]
    pub fn counter(&self, idx: usize) -> u8 {
        self.counters[idx]
    }

    /// Predicted direction at `idx`.
    #[inline]
    pub fn taken(&self, idx: usize) -> bool {
        self.counters[idx] >= 2
    }

    /// Updates the counter at `idx` and shifts the branch's history.
    pub fn update(&mut self, pc: Addr, idx: usize, taken: bool) {
        let c = &mut self.counters[idx];
        if taken {
            if *c < 3 {
                *c += 1;
            }
        } else if *c > 0 {
            *c -= 1;
        }
        let l1 = self.l1_index(pc);
        let mask = (1u64 << self.hist_bits) - 1;
        self.histories[l1] = ((self.histories[l1] << 1) | u64::from(taken)) & mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_alternating_pattern() {
        let mut p = TwoLev::new(1, 256, 4, false);
        let pc = 0x80;
        // Train on a strict T,N,T,N pattern.
        for i in 0..64 {
            let idx = p.index(pc);
            p.update(pc, idx, i % 2 == 0);
        }
        // After training, the history disambiguates the two phases.
        let idx = p.index(pc);
        let pred_after_n = p.taken(idx);
        p.update(pc, idx, true);
        let idx = p.index(pc);
        let pred_after_t = p.taken(idx);
        assert!(pred_after_n);
        assert!(!pred_after_t);
    }

    #[test]
    fn test_xor_changes_index() {
        let mut p = TwoLev::new(1, 256, 8, true);
        let idx_a = p.index(0x1000);
        let idx_b = p.index(0x1008);
        // Same (empty) history, different PCs: gshare hashing separates them.
        assert_ne!(idx_a, idx_b);
        p.update(0x1000, idx_a, true);
    }
}
