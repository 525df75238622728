//! Register bank.
//!
//! One bank holds the integer, floating-point, and control registers behind
//! the unified dependency-name interface. The architectural register file is
//! one bank; every speculation level of every thread shadows it with a full
//! copy.

use crate::isa::{DepName, FP_BASE, NUM_FREGS, NUM_IREGS, REG_HI, REG_LO, REG_ZERO};

/// A full register bank: integer + floating-point + control registers.
#[derive(Clone, Debug, Default)]
pub struct RegBank {
    int: [u64; NUM_IREGS],
    fp: [u64; NUM_FREGS],
    hi: u64,
    lo: u64,
}

impl RegBank {
    /// Creates a zeroed bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a register by dependency name. `r0` always reads zero.
    pub fn get(&self, name: DepName) -> u64 {
        match name {
            REG_ZERO => 0,
            n if n < NUM_IREGS => self.int[n],
            n if n < FP_BASE + NUM_FREGS => self.fp[n - FP_BASE],
            REG_HI => self.hi,
            REG_LO => self.lo,
            _ => 0,
        }
    }

    /// Writes a register by dependency name. Writes to `r0` are dropped.
    pub fn set(&mut self, name: DepName, val: u64) {
        match name {
            REG_ZERO => {}
            n if n < NUM_IREGS => self.int[n] = val,
            n if n < FP_BASE + NUM_FREGS => self.fp[n - FP_BASE] = val,
            REG_HI => self.hi = val,
            REG_LO => self.lo = val,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_register() {
        let mut bank = RegBank::new();
        bank.set(REG_ZERO, 99);
        assert_eq!(bank.get(REG_ZERO), 0);
    }

    #[test]
    fn test_banks_are_disjoint() {
        let mut bank = RegBank::new();
        bank.set(5, 10);
        bank.set(FP_BASE + 5, 20);
        bank.set(REG_HI, 30);
        assert_eq!(bank.get(5), 10);
        assert_eq!(bank.get(FP_BASE + 5), 20);
        assert_eq!(bank.get(REG_HI), 30);
    }
}
