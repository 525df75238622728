//! Branch target buffer.
//!
//! Set-associative cache of branch target addresses, LRU within a set.
//! Installed only with non-speculative outcomes (the caller gates updates).

use crate::common::Addr;

#[derive(Clone, Default)]
struct BtbEntry {
    valid: bool,
    pc: Addr,
    target: Addr,
    lru: u64,
}

/// Set-associative branch target buffer.
pub struct Btb {
    entries: Vec<BtbEntry>,
    sets: usize,
    assoc: usize,
    stamp: u64,
}

impl Btb {
    /// Creates a BTB with `sets` × `assoc` entries (`sets` is a power of
    /// two, enforced by configuration validation).
    pub fn new(sets: usize, assoc: usize) -> Self {
        Self {
            entries: vec![BtbEntry::default(); sets * assoc],
            sets,
            assoc,
            stamp: 0,
        }
    }

    #[inline]
    fn set_base(&self, pc: Addr) -> usize {
        (((pc >> 3) as usize) & (self.sets - 1)) * self.assoc
    }

    /// Predicted target for the branch at `pc`, if present.
    pub fn lookup(&self, pc: Addr) -> Option<Addr> {
        let base = self.set_base(pc);
        self.entries[base..base + self.assoc]
            .iter()
            .find(|e| e.valid && e.pc == pc)
            .map(|e| e.target)
    }

    /// Installs or refreshes the target for the branch at `pc`.
    pub fn update(&mut self, pc: Addr, target: Addr) {
        self.stamp += 1;
        let base = self.set_base(pc);
        let set = &mut self.entries[base..base + self.assoc];

        if let Some(e) = set.iter_mut().find(|e| e.valid && e.pc == pc) {
            e.target = target;
            e.lru = self.stamp;
            return;
        }
        let victim = set
            .iter_mut()
            .min_by_key(|e| if e.valid { e.lru } else { 0 })
            .unwrap();
        victim.valid = true;
        victim.pc = pc;
        victim.target = target;
        victim.lru = self.stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_hit() {
        let mut btb = Btb::new(16, 2);
        assert_eq!(btb.lookup(0x100), None);
        btb.update(0x100, 0x400);
        assert_eq!(btb.lookup(0x100), Some(0x400));
    }

    #[test]
    fn test_lru_eviction_within_set() {
        let mut btb = Btb::new(1, 2);
        btb.update(0x100, 1);
        btb.update(0x200, 2);
        // Touch 0x100, then install a third branch: 0x200 is the victim.
        btb.update(0x100, 1);
        btb.update(0x300, 3);
        assert_eq!(btb.lookup(0x100), Some(1));
        assert_eq!(btb.lookup(0x200), None);
        assert_eq!(btb.lookup(0x300), Some(3));
    }
}
