//! Thread table and fork lineage.
//!
//! A finite pool of hardware-thread slots. On every detected misprediction
//! the dispatcher tries to fork a sibling thread down the correct path; the
//! lineage machinery here decides, at recovery time, which threads descend
//! from a given fork epoch and must die, and which are unrelated siblings
//! that must survive.
//!
//! A thread `c` is a descendant of `t` at fork epoch `e` iff
//! `c.parent_fork_counters[t] >= e`. That single predicate drives squashing,
//! fetch-queue invalidation, and slot reclamation.

use crate::common::Addr;
use tracing::debug;

/// State of one hardware-thread slot.
#[derive(Debug, Clone)]
pub struct ThreadSlot {
    /// Slot holds a live thread.
    pub in_use: bool,
    /// The fetch arbiter may pick this thread.
    pub keep_fetching: bool,
    /// PC of the instruction currently being fetched.
    pub fetch_regs_pc: Addr,
    /// Predicted next fetch PC.
    pub fetch_pred_pc: Addr,
    /// Thread is on a mis-speculated path.
    pub spec_mode: bool,
    /// Speculation nesting depth; −1 when non-speculative.
    pub spec_level: i32,
    /// Monotonic count of forks this thread has spun off.
    pub fork_counter: i32,
    /// For each thread `t`: the value of `t.fork_counter` at the moment this
    /// thread was forked from `t`, or −1 if `t` is not an ancestor.
    pub parent_fork_counters: Vec<i32>,
}

impl ThreadSlot {
    fn empty(max_threads: usize) -> Self {
        Self {
            in_use: false,
            keep_fetching: true,
            fetch_regs_pc: 0,
            fetch_pred_pc: 0,
            spec_mode: false,
            spec_level: -1,
            fork_counter: 0,
            parent_fork_counters: vec![-1; max_threads],
        }
    }
}

/// The pool of thread slots.
pub struct ThreadTable {
    slots: Vec<ThreadSlot>,
}

impl ThreadTable {
    /// Creates the table with thread 0 live and all other slots free.
    pub fn new(max_threads: usize) -> Self {
        let mut slots: Vec<ThreadSlot> = (0..max_threads)
            .map(|_| ThreadSlot::empty(max_threads))
            .collect();
        slots[0].in_use = true;
        Self { slots }
    }

    /// Number of slots in the pool.
    #[inline]
    pub fn max_threads(&self) -> usize {
        self.slots.len()
    }

    /// Shared access to a slot.
    #[inline]
    pub fn slot(&self, t: usize) -> &ThreadSlot {
        &self.slots[t]
    }

    /// Exclusive access to a slot.
    #[inline]
    pub fn slot_mut(&mut self, t: usize) -> &mut ThreadSlot {
        &mut self.slots[t]
    }

    /// Number of live threads.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// True if work produced by `owner` at fork epoch `epoch` is on
    /// `observer`'s own execution path: either the same thread, or
    /// `observer` descends from `owner` at an epoch at or past `epoch`.
    pub fn is_ancestral(&self, owner: usize, epoch: i32, observer: usize) -> bool {
        observer == owner || self.slots[observer].parent_fork_counters[owner] >= epoch
    }

    /// True if `candidate` (≠ `origin`) descends from `origin` at fork epoch
    /// ≥ `epoch` — the invalidation predicate.
    pub fn descends(&self, candidate: usize, origin: usize, epoch: i32) -> bool {
        candidate != origin && self.slots[candidate].parent_fork_counters[origin] >= epoch
    }

    /// Finds a free slot for a fork, scanning after the forking thread and
    /// wrapping around. Returns `None` when the pool is exhausted.
    pub fn find_fork_candidate(&self, forking: usize) -> Option<usize> {
        let n = self.slots.len();
        (forking + 1..n)
            .chain(0..forking)
            .find(|&t| !self.slots[t].in_use)
    }

    /// Claims `child` as a fork of `parent` targeting `fork_pc`, recording
    /// lineage. The parent's own fork counter is bumped by the caller after
    /// the branch entry is stamped.
    pub fn allocate_fork(&mut self, child: usize, parent: usize, fork_pc: Addr) {
        let parent_counters = self.slots[parent].parent_fork_counters.clone();
        let parent_epoch = self.slots[parent].fork_counter;
        let slot = &mut self.slots[child];
        slot.in_use = true;
        slot.keep_fetching = true;
        slot.fork_counter = 0;
        slot.parent_fork_counters = parent_counters;
        slot.parent_fork_counters[parent] = parent_epoch;
        slot.fetch_pred_pc = fork_pc;
        slot.fetch_regs_pc = fork_pc.wrapping_sub(crate::common::INST_BYTES);
        debug!(child, parent, fork_pc, "thread forked");
    }

    /// Releases a slot: marks it free and erases its own ancestry row.
    pub fn free_slot(&mut self, t: usize) {
        let slot = &mut self.slots[t];
        slot.in_use = false;
        slot.spec_mode = false;
        slot.spec_level = -1;
        for c in &mut slot.parent_fork_counters {
            *c = -1;
        }
    }

    /// Erases every other thread's ancestry record of `t` (used when `t`'s
    /// slot is reclaimed at commit, so a future occupant starts clean).
    pub fn clear_column(&mut self, t: usize) {
        for slot in &mut self.slots {
            slot.parent_fork_counters[t] = -1;
        }
    }

    /// Frees every thread descending from `origin` at epoch ≥ `epoch`.
    /// Returns the freed thread ids so the caller can drop their shadow
    /// state.
    pub fn invalidate_descendants(&mut self, origin: usize, epoch: i32) -> Vec<usize> {
        let victims: Vec<usize> = (0..self.slots.len())
            .filter(|&t| self.descends(t, origin, epoch))
            .collect();
        for &t in &victims {
            debug!(thread = t, origin, epoch, "descendant thread invalidated");
            self.free_slot(t);
        }
        victims
    }

    /// Round-robin search for the next fetch-eligible thread, starting after
    /// `from`. Returns `None` only when no thread is eligible at all.
    pub fn next_fetch_thread(&self, from: usize) -> Option<usize> {
        let n = self.slots.len();
        (from + 1..n)
            .chain(0..n)
            .find(|&t| self.slots[t].in_use && self.slots[t].keep_fetching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_thread_zero_live() {
        let table = ThreadTable::new(4);
        assert!(table.slot(0).in_use);
        assert!(!table.slot(1).in_use);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_fork_lineage_recorded() {
        let mut table = ThreadTable::new(4);
        table.slot_mut(0).fork_counter = 3;
        let child = table.find_fork_candidate(0).unwrap();
        assert_eq!(child, 1);
        table.allocate_fork(child, 0, 0x2000);
        assert!(table.slot(child).in_use);
        assert_eq!(table.slot(child).parent_fork_counters[0], 3);
        assert_eq!(table.slot(child).fetch_pred_pc, 0x2000);
    }

    #[test]
    fn test_candidate_search_wraps() {
        let mut table = ThreadTable::new(4);
        table.slot_mut(1).in_use = true;
        table.slot_mut(2).in_use = true;
        table.slot_mut(3).in_use = true;
        // Only slot 0 is free, and thread 2 is forking.
        table.slot_mut(0).in_use = false;
        assert_eq!(table.find_fork_candidate(2), Some(0));
        table.slot_mut(0).in_use = true;
        assert_eq!(table.find_fork_candidate(2), None);
    }

    #[test]
    fn test_descendant_epochs() {
        let mut table = ThreadTable::new(4);
        // Child 1 forked from thread 0 at epoch 2, child 2 at epoch 5.
        table.slot_mut(1).in_use = true;
        table.slot_mut(1).parent_fork_counters[0] = 2;
        table.slot_mut(2).in_use = true;
        table.slot_mut(2).parent_fork_counters[0] = 5;

        // Recovery at epoch 3 kills only the later fork.
        assert!(!table.descends(1, 0, 3));
        assert!(table.descends(2, 0, 3));
        let freed = table.invalidate_descendants(0, 3);
        assert_eq!(freed, vec![2]);
        assert!(table.slot(1).in_use);
        assert!(!table.slot(2).in_use);
    }

    #[test]
    fn test_ancestral_predicate() {
        let mut table = ThreadTable::new(4);
        table.slot_mut(1).parent_fork_counters[0] = 4;
        assert!(table.is_ancestral(0, 4, 1));
        assert!(!table.is_ancestral(0, 5, 1));
        assert!(table.is_ancestral(0, 9, 0));
    }

    #[test]
    fn test_round_robin_fetch_pick() {
        let mut table = ThreadTable::new(4);
        table.slot_mut(2).in_use = true;
        assert_eq!(table.next_fetch_thread(0), Some(2));
        table.slot_mut(2).keep_fetching = false;
        assert_eq!(table.next_fetch_thread(0), Some(0));
        table.slot_mut(0).keep_fetching = false;
        assert_eq!(table.next_fetch_thread(0), None);
    }
}
