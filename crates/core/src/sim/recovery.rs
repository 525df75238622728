//! Squash and recovery machinery.
//!
//! Recovery walks the window from the tail back toward (but not including)
//! the resolving branch, squashing every entry on the origin thread or on a
//! thread that descends from it at the branch's fork epoch or later.
//! Entries belonging to unrelated sibling threads are left alone — their
//! work is independent of this misprediction. The same lineage predicate
//! then invalidates descendant thread slots and flags matching fetch-queue
//! entries in place.

use crate::pipeline::rslink::{EntryRef, Queue};
use crate::sim::engine::Engine;
use tracing::trace;

impl Engine {
    /// Squashes in-flight entries younger than `branch` that belong to
    /// `origin` or to a descendant forked at epoch ≥ `epoch`.
    ///
    /// `origin_is_wrong_path` asserts that squashed work on the origin
    /// thread is speculative; it is false only when discarding a forked
    /// sibling whose (never-taken) path ran non-speculatively.
    pub(crate) fn recover_window(
        &mut self,
        branch: EntryRef,
        origin: usize,
        epoch: i32,
        origin_is_wrong_path: bool,
    ) {
        debug_assert_eq!(branch.queue, Queue::Ruu);
        let branch_idx = branch.index;
        let mut ruu_idx = self.window.ruu.prev_index(self.window.ruu.tail_index());
        let mut lsq_idx = self.window.lsq.prev_index(self.window.lsq.tail_index());

        while ruu_idx != branch_idx {
            let (entry_thread, ea_comp, spec_mode) = {
                let e = self.window.ruu.entry(ruu_idx);
                (e.thread_id, e.ea_comp, e.spec_mode)
            };

            if !self.threads.is_ancestral(origin, epoch, entry_thread) {
                // Unrelated sibling work survives, but the LSQ walk must
                // stay synchronized with the RUU walk.
                if ea_comp {
                    lsq_idx = self.window.lsq.prev_index(lsq_idx);
                }
                ruu_idx = self.window.ruu.prev_index(ruu_idx);
                continue;
            }

            // The mispredicted branch itself remains, so the window cannot
            // drain to empty, and the walk must hit the branch before the
            // head.
            assert!(!self.window.ruu.is_empty(), "empty RUU during recovery");
            assert!(
                ruu_idx != self.window.ruu.head_index(),
                "RUU head and tail broken during recovery"
            );
            if origin_is_wrong_path && entry_thread == origin {
                assert!(spec_mode, "squashing non-speculative work on the origin thread");
            }

            if ea_comp {
                assert!(!self.window.lsq.is_empty(), "RUU and LSQ out of sync");
                self.window.lsq.entry_mut(lsq_idx).squash();
                lsq_idx = self.window.lsq.prev_index(lsq_idx);
            }

            trace!(index = ruu_idx, thread = entry_thread, "squashing entry");
            self.window.ruu.entry_mut(ruu_idx).squash();
            ruu_idx = self.window.ruu.prev_index(ruu_idx);
        }
    }

    /// Flags fetch-queue entries of `origin` and its epoch-descendants as
    /// squashed, in place.
    pub(crate) fn squash_fetch_lineage(&mut self, origin: usize, epoch: i32) {
        let Self {
            fetch_q, threads, ..
        } = self;
        fetch_q.squash_where(|t| threads.is_ancestral(origin, epoch, t));
    }

    /// Rolls the branch's thread back to the speculation level it held when
    /// the branch dispatched, drains the speculative store table, and
    /// redirects the thread's fetch to the correct path.
    pub(crate) fn tracer_recover(&mut self, branch: EntryRef) {
        let (thread, branch_level, next_pc, epoch) = {
            let e = self.window.get(branch).expect("recovery on a dead branch");
            (e.thread_id, e.spec_level, e.next_pc, e.fork_counter)
        };
        assert!(
            self.threads.slot(thread).spec_mode,
            "cannot recover unless in speculative mode"
        );

        {
            let slot = self.threads.slot_mut(thread);
            slot.spec_level = branch_level;
            if branch_level < 0 {
                slot.spec_mode = false;
            }
        }
        self.spec_regs.recover(thread, branch_level);
        self.rename.recover(thread, branch_level);
        self.spec_mem.clear();

        self.squash_fetch_lineage(thread, epoch);

        let slot = self.threads.slot_mut(thread);
        slot.fetch_pred_pc = next_pc;
        slot.fetch_regs_pc = next_pc;
    }

    /// Frees every thread slot descending from `origin` at epoch ≥ `epoch`
    /// and drops the freed threads' shadow state.
    pub(crate) fn free_descendants(&mut self, origin: usize, epoch: i32) {
        let freed = self.threads.invalidate_descendants(origin, epoch);
        for t in freed {
            self.rename.clear_thread(t);
            self.spec_regs.clear(t);
        }
    }

    /// Commit-time check: after a mispredicted forking branch retires, every
    /// younger in-flight entry on its thread (or an epoch-descendant) must
    /// already be squashed.
    pub(crate) fn verify_lineage_squashed(&self, branch_idx: usize, origin: usize, epoch: i32) {
        let mut idx = self.window.ruu.prev_index(self.window.ruu.tail_index());
        while idx != branch_idx {
            let e = self.window.ruu.entry(idx);
            if self.threads.is_ancestral(origin, epoch, e.thread_id) {
                assert!(e.squashed, "unsquashed entry on a dead lineage at commit");
            }
            idx = self.window.ruu.prev_index(idx);
        }
    }
}
