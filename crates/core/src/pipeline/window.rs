//! The in-flight instruction window: reorder buffer (RUU) and load/store
//! queue (LSQ).
//!
//! Both are circular queues of the same station record. Instructions enter
//! at the tail in program order and retire from the head. Memory operations
//! occupy a pair of stations: an address-generation entry in the RUU (output:
//! the synthetic transfer register) and the access itself in the LSQ, which
//! consumes the transfer register plus the store value.
//!
//! Entry identity is `(slot, tag)`. Squashing bumps the tag and releases the
//! entry's dependency chains; every outstanding reference becomes stale in
//! O(1) and is ignored at its next use.

use crate::common::{Addr, Cycle, MAX_IDEPS, MAX_ODEPS};
use crate::isa::{DepName, Opcode};
use crate::pipeline::rslink::{DepLink, EntryRef, Queue};
use crate::units::bpred::DirCookie;

/// One reservation station, shared by the RUU and LSQ.
#[derive(Debug, Clone, Default)]
pub struct WindowEntry {
    /// Raw instruction word.
    pub raw_inst: u64,
    /// Effective opcode for timing (the RUU half of a split memory operation
    /// carries [`Opcode::Agen`]).
    pub op: Opcode,
    /// Instruction PC.
    pub pc: Addr,
    /// Architecturally correct next PC.
    pub next_pc: Addr,
    /// Predicted next PC.
    pub pred_pc: Addr,
    /// Entry lives in the LSQ.
    pub in_lsq: bool,
    /// Entry is the address-generation half of a memory operation.
    pub ea_comp: bool,
    /// Completing this entry exposes a misprediction.
    pub recover_inst: bool,
    /// Return-address-stack top at fetch, for predictor recovery.
    pub ras_idx: usize,
    /// Predictor direction-update cookie captured at fetch.
    pub cookie: DirCookie,
    /// Dispatched on a mis-speculated path.
    pub spec_mode: bool,
    /// Speculation level at dispatch; −1 when non-speculative.
    pub spec_level: i32,
    /// Effective address for memory operations.
    pub addr: Addr,
    /// Instance tag; incremented to squash.
    pub tag: u32,
    /// Program-order sequence number.
    pub seq: u64,
    /// Dispatch cycle, for slip accounting.
    pub slip_cycle: Cycle,
    /// Register operands ready and sitting in the ready queue.
    pub queued: bool,
    /// Operation is or was executing.
    pub issued: bool,
    /// Operation has completed execution.
    pub completed: bool,
    /// Operation was squashed.
    pub squashed: bool,
    /// Output register names.
    pub onames: [Option<DepName>; MAX_ODEPS],
    /// Chains to consuming operations, one per output.
    pub odeps: [Vec<DepLink>; MAX_ODEPS],
    /// Input-operand readiness.
    pub idep_ready: [bool; MAX_IDEPS],
    /// Owning thread.
    pub thread_id: usize,
    /// Owning thread's fork counter at dispatch (raised to the new epoch if
    /// this entry itself forked).
    pub fork_counter: i32,
    /// This entry allocated a sibling thread at dispatch.
    pub triggers_fork: bool,
    /// Thread id of the forked sibling.
    pub fork_id: usize,
}

impl WindowEntry {
    /// All register operands ready.
    #[inline]
    pub fn operands_ready(&self) -> bool {
        self.idep_ready.iter().all(|&r| r)
    }

    /// Store-value operand ready (LSQ store slot 0).
    #[inline]
    pub fn store_op_ready(&self) -> bool {
        self.idep_ready[0]
    }

    /// Store-address operand ready (LSQ store slot 1).
    #[inline]
    pub fn store_addr_ready(&self) -> bool {
        self.idep_ready[1]
    }

    /// Squashes the entry: bumps the tag (staling all references), marks it,
    /// and releases its dependency chains.
    pub fn squash(&mut self) {
        self.tag = self.tag.wrapping_add(1);
        self.squashed = true;
        for chain in &mut self.odeps {
            chain.clear();
        }
    }

    /// Invalidates the instance at retirement (tag bump without the squashed
    /// mark).
    pub fn retire(&mut self) {
        self.tag = self.tag.wrapping_add(1);
    }
}

/// A circular queue of window entries.
pub struct Ring {
    entries: Vec<WindowEntry>,
    head: usize,
    tail: usize,
    num: usize,
}

impl Ring {
    /// Creates a ring of `size` stations.
    pub fn new(size: usize) -> Self {
        let mut entries = Vec::with_capacity(size);
        entries.resize_with(size, WindowEntry::default);
        Self {
            entries,
            head: 0,
            tail: 0,
            num: 0,
        }
    }

    /// Ring capacity.
    #[inline]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Occupied stations.
    #[inline]
    pub fn len(&self) -> usize {
        self.num
    }

    /// True when no stations are occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// True when every station is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.num == self.entries.len()
    }

    /// Index of the oldest entry.
    #[inline]
    pub fn head_index(&self) -> usize {
        self.head
    }

    /// Index where the next entry will be allocated.
    #[inline]
    pub fn tail_index(&self) -> usize {
        self.tail
    }

    /// The slot before `idx`, wrapping.
    #[inline]
    pub fn prev_index(&self, idx: usize) -> usize {
        (idx + self.entries.len() - 1) % self.entries.len()
    }

    /// The slot after `idx`, wrapping.
    #[inline]
    pub fn next_index(&self, idx: usize) -> usize {
        (idx + 1) % self.entries.len()
    }

    /// Direct access to a station.
    #[inline]
    pub fn entry(&self, idx: usize) -> &WindowEntry {
        &self.entries[idx]
    }

    /// Direct mutable access to a station.
    #[inline]
    pub fn entry_mut(&mut self, idx: usize) -> &mut WindowEntry {
        &mut self.entries[idx]
    }

    /// Claims the tail station. The caller fills it in place; the station's
    /// tag is preserved from its previous occupant.
    pub fn advance_tail(&mut self) {
        debug_assert!(!self.is_full());
        self.tail = (self.tail + 1) % self.entries.len();
        self.num += 1;
    }

    /// Releases the head station after retirement.
    pub fn retire_head(&mut self) {
        debug_assert!(self.num > 0);
        self.head = (self.head + 1) % self.entries.len();
        self.num -= 1;
    }

    /// Head-to-tail iteration over occupied station indices.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        let size = self.entries.len();
        let head = self.head;
        (0..self.num).map(move |i| (head + i) % size)
    }

    /// Circular-descriptor consistency: `(head + num) % size == tail`.
    pub fn is_consistent(&self) -> bool {
        (self.head + self.num) % self.entries.len() == self.tail
    }
}

/// The paired RUU and LSQ rings.
pub struct Window {
    /// Reorder buffer.
    pub ruu: Ring,
    /// Load/store queue.
    pub lsq: Ring,
}

impl Window {
    /// Creates the window with the given ring sizes.
    pub fn new(ruu_size: usize, lsq_size: usize) -> Self {
        Self {
            ruu: Ring::new(ruu_size),
            lsq: Ring::new(lsq_size),
        }
    }

    /// The ring a reference points into.
    #[inline]
    pub fn ring(&self, queue: Queue) -> &Ring {
        match queue {
            Queue::Ruu => &self.ruu,
            Queue::Lsq => &self.lsq,
        }
    }

    /// Mutable ring access.
    #[inline]
    pub fn ring_mut(&mut self, queue: Queue) -> &mut Ring {
        match queue {
            Queue::Ruu => &mut self.ruu,
            Queue::Lsq => &mut self.lsq,
        }
    }

    /// Builds a reference to a station, snapshotting its current tag.
    pub fn make_ref(&self, queue: Queue, index: usize) -> EntryRef {
        EntryRef {
            queue,
            index,
            tag: self.ring(queue).entry(index).tag,
        }
    }

    /// Resolves a reference, returning `None` if the target was squashed or
    /// retired since the reference was created.
    pub fn get(&self, r: EntryRef) -> Option<&WindowEntry> {
        let e = self.ring(r.queue).entry(r.index);
        (e.tag == r.tag).then_some(e)
    }

    /// Mutable resolution with the same staleness check.
    pub fn get_mut(&mut self, r: EntryRef) -> Option<&mut WindowEntry> {
        let e = self.ring_mut(r.queue).entry_mut(r.index);
        (e.tag == r.tag).then_some(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ring_wraparound() {
        let mut ring = Ring::new(2);
        for i in 0..10u64 {
            assert!(!ring.is_full());
            let idx = ring.tail_index();
            ring.entry_mut(idx).seq = i;
            ring.advance_tail();
            assert!(ring.is_consistent());
            assert_eq!(ring.entry(ring.head_index()).seq, i);
            ring.entry_mut(ring.head_index()).retire();
            ring.retire_head();
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_stale_reference_after_squash() {
        let mut window = Window::new(4, 4);
        let idx = window.ruu.tail_index();
        window.ruu.advance_tail();
        let r = window.make_ref(Queue::Ruu, idx);
        assert!(window.get(r).is_some());

        window.ruu.entry_mut(idx).squash();
        assert!(window.get(r).is_none());

        // A fresh reference to the reused slot resolves again.
        let r2 = window.make_ref(Queue::Ruu, idx);
        assert!(window.get(r2).is_some());
        assert_ne!(r.tag, r2.tag);
    }

    #[test]
    fn test_squash_releases_dep_chains() {
        let mut window = Window::new(4, 4);
        let idx = window.ruu.tail_index();
        window.ruu.advance_tail();
        let consumer = EntryRef {
            queue: Queue::Lsq,
            index: 0,
            tag: 0,
        };
        window.ruu.entry_mut(idx).odeps[0].push(DepLink {
            target: consumer,
            opnum: 1,
        });
        window.ruu.entry_mut(idx).squash();
        assert!(window.ruu.entry(idx).odeps[0].is_empty());
        assert!(window.ruu.entry(idx).squashed);
    }

    #[test]
    fn test_operand_readiness() {
        let mut e = WindowEntry::default();
        assert!(!e.operands_ready());
        e.idep_ready = [true, true, true];
        assert!(e.operands_ready());
        e.idep_ready[1] = false;
        assert!(!e.store_addr_ready());
        assert!(e.store_op_ready());
    }
}
