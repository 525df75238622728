//! Speculative shadow state.
//!
//! Wrong-path execution must observe its own writes without disturbing
//! architectural state. Two structures provide that:
//! 1. **`SpecRegs`** — per-thread stacks of full register-bank copies, one
//!    per speculation level. Entering a level pushes a copy of the level
//!    below (or of the architectural bank); recovering truncates.
//! 2. **`SpecMem`** — a global address-hashed table of 8-byte buffers.
//!    Speculative stores land here; speculative loads check here before
//!    falling back to architectural memory. The whole table drains on
//!    recovery.
//!
//! The two exec-view adapters route the semantic evaluator to either the
//! architectural state or this shadow state.

use crate::common::{Addr, MAX_SPEC_LEVELS, STORE_HASH_SIZE};
use crate::core::regs::RegBank;
use crate::isa::{DepName, ExecFault, ExecView};
use crate::mem::Memory;

/// Per-thread stacks of speculative register banks.
///
/// `stacks[t].len() == spec_level + 1` for a thread at `spec_level ≥ 0`;
/// a non-speculative thread has an empty stack.
pub struct SpecRegs {
    stacks: Vec<Vec<RegBank>>,
}

impl SpecRegs {
    /// Creates empty stacks for `max_threads` threads.
    pub fn new(max_threads: usize) -> Self {
        Self {
            stacks: (0..max_threads).map(|_| Vec::new()).collect(),
        }
    }

    /// Current nesting depth of a thread's shadow stack.
    pub fn depth(&self, thread: usize) -> usize {
        self.stacks[thread].len()
    }

    /// Pushes a new speculation level for `thread`, copying the level below,
    /// or `arch` when entering level 0.
    pub fn enter_level(&mut self, thread: usize, arch: &RegBank) {
        let stack = &mut self.stacks[thread];
        assert!(
            stack.len() < MAX_SPEC_LEVELS,
            "speculation level bound exceeded on thread {thread}"
        );
        let bank = match stack.last() {
            Some(top) => top.clone(),
            None => arch.clone(),
        };
        stack.push(bank);
    }

    /// Seeds a forked child's level 0 from the parent's bank at
    /// `parent_level`. The child of a non-speculative parent gets an empty
    /// stack instead (it runs non-speculatively).
    pub fn fork_from(&mut self, child: usize, parent: usize, parent_level: i32) {
        if parent_level < 0 {
            self.stacks[child].clear();
        } else {
            let bank = self.stacks[parent][parent_level as usize].clone();
            self.stacks[child] = vec![bank];
        }
    }

    /// Truncates `thread`'s stack back to `new_level` (−1 clears it).
    pub fn recover(&mut self, thread: usize, new_level: i32) {
        self.stacks[thread].truncate((new_level + 1).max(0) as usize);
    }

    /// Drops all shadow state for a released thread slot.
    pub fn clear(&mut self, thread: usize) {
        self.stacks[thread].clear();
    }

    /// The bank at `thread`'s current (topmost) level.
    pub fn top_mut(&mut self, thread: usize) -> &mut RegBank {
        self.stacks[thread]
            .last_mut()
            .expect("speculative bank accessed on non-speculative thread")
    }

    /// The bank at a specific level of `thread`.
    pub fn bank(&self, thread: usize, level: usize) -> &RegBank {
        &self.stacks[thread][level]
    }
}

/// One speculative store record: an address and an 8-byte buffer.
struct SpecSlot {
    addr: Addr,
    data: [u8; 8],
}

/// Address-hashed speculative store table, shared by all threads.
pub struct SpecMem {
    buckets: Vec<Vec<SpecSlot>>,
}

impl Default for SpecMem {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecMem {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            buckets: (0..STORE_HASH_SIZE).map(|_| Vec::new()).collect(),
        }
    }

    #[inline]
    fn bucket(addr: Addr) -> usize {
        (((addr >> 24) ^ (addr >> 16) ^ (addr >> 8) ^ addr) as usize) & (STORE_HASH_SIZE - 1)
    }

    /// Looks up a buffered speculative write for `addr`.
    pub fn lookup(&self, addr: Addr) -> Option<&[u8; 8]> {
        self.buckets[Self::bucket(addr)]
            .iter()
            .find(|s| s.addr == addr)
            .map(|s| &s.data)
    }

    /// Buffers a speculative write of `size` bytes at `addr`.
    ///
    /// Writes at distinct base addresses are independent records even when
    /// their byte ranges overlap; overlapping records are not coalesced.
    pub fn write(&mut self, addr: Addr, size: usize, val: u64) {
        let bucket = &mut self.buckets[Self::bucket(addr)];
        let slot = match bucket.iter_mut().find(|s| s.addr == addr) {
            Some(slot) => slot,
            None => {
                bucket.push(SpecSlot {
                    addr,
                    data: [0; 8],
                });
                bucket.last_mut().unwrap()
            }
        };
        slot.data[..size].copy_from_slice(&val.to_le_bytes()[..size]);
    }

    /// Reads `size` bytes buffered at `addr`, if present.
    pub fn read(&self, addr: Addr, size: usize) -> Option<u64> {
        self.lookup(addr).map(|data| {
            let mut buf = [0u8; 8];
            buf[..size].copy_from_slice(&data[..size]);
            u64::from_le_bytes(buf)
        })
    }

    /// Drains the whole table (mis-speculation recovery).
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// True when no speculative writes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exec view over architectural state. Faults propagate.
pub struct ArchView<'a> {
    /// Architectural register bank.
    pub regs: &'a mut RegBank,
    /// Architectural memory.
    pub mem: &'a mut Memory,
}

impl ExecView for ArchView<'_> {
    fn reg(&self, name: DepName) -> u64 {
        self.regs.get(name)
    }

    fn set_reg(&mut self, name: DepName, val: u64) {
        self.regs.set(name, val);
    }

    fn load(&mut self, addr: Addr, size: usize) -> Result<u64, ExecFault> {
        if !self.mem.valid_addr(addr) || addr & (size as u64 - 1) != 0 {
            return Err(ExecFault::Mem(addr));
        }
        Ok(self.mem.read(addr, size))
    }

    fn store(&mut self, addr: Addr, size: usize, val: u64) -> Result<(), ExecFault> {
        if !self.mem.valid_addr(addr) || addr & (size as u64 - 1) != 0 {
            return Err(ExecFault::Mem(addr));
        }
        // Instruction memory is immutable for the machine's lifetime.
        assert!(
            !self.mem.in_text(addr),
            "non-speculative write into instruction memory at {addr:#x}"
        );
        self.mem.write(addr, size, val);
        Ok(())
    }
}

/// Exec view over a thread's speculative shadow. Faults are suppressed:
/// invalid accesses read as zero and writes to invalid addresses vanish.
pub struct SpecView<'a> {
    /// The thread's current-level shadow bank.
    pub bank: &'a mut RegBank,
    /// The global speculative store table.
    pub spec_mem: &'a mut SpecMem,
    /// Architectural memory, read-only fallback for speculative loads.
    pub mem: &'a Memory,
}

impl SpecView<'_> {
    fn access_ok(&self, addr: Addr, size: usize) -> bool {
        // Text reads are always permitted; anything else must be a valid,
        // aligned data address.
        (self.mem.valid_addr(addr) || self.mem.valid_text_addr(addr))
            && addr & (size as u64 - 1) == 0
    }
}

impl ExecView for SpecView<'_> {
    fn reg(&self, name: DepName) -> u64 {
        self.bank.get(name)
    }

    fn set_reg(&mut self, name: DepName, val: u64) {
        self.bank.set(name, val);
    }

    fn load(&mut self, addr: Addr, size: usize) -> Result<u64, ExecFault> {
        if !self.access_ok(addr, size) {
            return Ok(0);
        }
        match self.spec_mem.read(addr, size) {
            Some(v) => Ok(v),
            None => Ok(self.mem.read(addr, size)),
        }
    }

    fn store(&mut self, addr: Addr, size: usize, val: u64) -> Result<(), ExecFault> {
        if self.access_ok(addr, size) {
            self.spec_mem.write(addr, size, val);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_stack_copy_on_entry() {
        let mut arch = RegBank::new();
        arch.set(1, 10);
        let mut spec = SpecRegs::new(2);

        spec.enter_level(0, &arch);
        assert_eq!(spec.top_mut(0).get(1), 10);
        spec.top_mut(0).set(1, 20);

        spec.enter_level(0, &arch);
        assert_eq!(spec.top_mut(0).get(1), 20);
        spec.top_mut(0).set(1, 30);

        // Recovering to level 0 exposes the untouched level-0 copy.
        spec.recover(0, 0);
        assert_eq!(spec.top_mut(0).get(1), 20);
        // Architectural state was never touched.
        assert_eq!(arch.get(1), 10);
    }

    #[test]
    fn test_fork_seeds_child_level_zero() {
        let arch = RegBank::new();
        let mut spec = SpecRegs::new(3);
        spec.enter_level(0, &arch);
        spec.top_mut(0).set(2, 7);
        spec.enter_level(0, &arch);
        spec.top_mut(0).set(2, 8);

        // Child forked at parent level 0 sees 7, not 8.
        spec.fork_from(1, 0, 0);
        assert_eq!(spec.top_mut(1).get(2), 7);

        // Child of a non-speculative parent has no shadow.
        spec.fork_from(2, 0, -1);
        assert_eq!(spec.depth(2), 0);
    }

    #[test]
    fn test_spec_mem_overlay_and_drain() {
        let mut mem = Memory::new();
        mem.write(0x2000, 8, 111);
        let mut sm = SpecMem::new();

        assert_eq!(sm.read(0x2000, 8), None);
        sm.write(0x2000, 8, 222);
        assert_eq!(sm.read(0x2000, 8), Some(222));
        // Architectural memory is untouched.
        assert_eq!(mem.read(0x2000, 8), 111);

        sm.clear();
        assert!(sm.is_empty());
    }

    #[test]
    fn test_spec_view_suppresses_faults() {
        let mem = Memory::new();
        let mut sm = SpecMem::new();
        let mut bank = RegBank::new();
        let mut view = SpecView {
            bank: &mut bank,
            spec_mem: &mut sm,
            mem: &mem,
        };
        // Null-page load reads zero instead of faulting.
        assert_eq!(view.load(0x8, 8), Ok(0));
        // Invalid store vanishes.
        view.store(0x8, 8, 5).unwrap();
        assert!(sm.is_empty());
    }
}
