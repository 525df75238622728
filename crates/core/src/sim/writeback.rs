//! Writeback stage.
//!
//! Drains every completion event due this cycle. A completing operation
//! wakes its dependents through the output chains and clears its create-
//! vector references. Branch resolution also happens here:
//!
//! - A **forking branch that mispredicted** confirms the forked sibling as
//!   the correct path: the branch's own thread stops fetching and its
//!   younger work (and descendant threads) are squashed, while the sibling
//!   runs on untouched. No fetch penalty is charged — the sibling has been
//!   fetching the correct path since dispatch.
//! - A **forking branch that predicted correctly** frees the sibling and
//!   its descendants instead.
//! - A **solo mispredicted branch** (no fork slot was free) performs the
//!   full in-place recovery: squash, shadow-state rollback, predictor
//!   recovery, and the fetch penalty.

use crate::common::INST_BYTES;
use crate::common::MAX_ODEPS;
use crate::config::SpecUpdate;
use crate::sim::engine::Engine;
use tracing::debug;

impl Engine {
    /// Runs the writeback stage for one cycle.
    pub(crate) fn writeback(&mut self) {
        while let Some(eref) = self.event_q.pop_due(self.cycle) {
            let Some(entry) = self.window.get(eref) else {
                continue; // squashed after scheduling
            };
            if entry.squashed {
                continue;
            }
            assert!(
                entry.operands_ready() && !entry.queued && entry.issued && !entry.completed,
                "completed inst not ready, not issued, or already completed"
            );

            let (
                op,
                pc,
                next_pc,
                pred_pc,
                in_lsq,
                thread,
                epoch,
                fork_id,
                triggers_fork,
                recover_inst,
                spec_mode,
                ras_idx,
                cookie,
            ) = {
                let e = self.window.get(eref).unwrap();
                (
                    e.op,
                    e.pc,
                    e.next_pc,
                    e.pred_pc,
                    e.in_lsq,
                    e.thread_id,
                    e.fork_counter,
                    e.fork_id,
                    e.triggers_fork,
                    e.recover_inst,
                    e.spec_mode,
                    e.ras_idx,
                    e.cookie,
                )
            };

            self.window.get_mut(eref).unwrap().completed = true;

            if triggers_fork {
                assert!(!in_lsq, "memory operation triggering a fork");
                if pred_pc != next_pc {
                    // The forked sibling carries the correct path. Kill this
                    // thread's younger work and its descendants; the sibling
                    // survives untouched.
                    debug!(thread, pc, "mispredicted forking branch resolved");
                    self.recover_window(eref, thread, epoch, true);
                    self.squash_fetch_lineage(thread, epoch);
                    self.threads.slot_mut(thread).keep_fetching = false;
                    self.free_descendants(thread, epoch);
                } else {
                    // Correctly predicted forking branch: the sibling was
                    // fetching a path that will never be taken. Free it and
                    // everything forked from it.
                    debug!(thread, pc, sibling = fork_id, "fork sibling discarded");
                    self.recover_window(eref, fork_id, 0, false);
                    self.squash_fetch_lineage(fork_id, 0);
                    self.free_descendants(fork_id, 0);
                    self.threads.free_slot(fork_id);
                    self.rename.clear_thread(fork_id);
                    self.spec_regs.clear(fork_id);
                }
            } else if recover_inst {
                assert!(!in_lsq, "mis-predicted load or store");
                // No fork backs this branch: recover in place and redirect
                // fetch down the correct path.
                debug!(thread, pc, next_pc, "in-place misprediction recovery");
                self.recover_window(eref, thread, epoch, true);
                self.tracer_recover(eref);
                if let Some(pred) = self.pred.as_mut() {
                    pred.recover(pc, ras_idx);
                }
                self.free_descendants(thread, epoch);
                self.threads.slot_mut(thread).keep_fetching = true;
                self.fetch_issue_delay = self.mispred_penalty;
            }

            // Speculative predictor update at writeback, if so configured.
            if self.spec_update == SpecUpdate::Wb && !in_lsq && op.is_ctrl() {
                let taken = next_pc != pc.wrapping_add(INST_BYTES);
                if let Some(pred) = self.pred.as_mut() {
                    pred.update(pc, next_pc, taken, &cookie);
                }
            }

            // Broadcast the result: clear stale renames, then walk the
            // output chains and wake consumers.
            for odep in 0..MAX_ODEPS {
                let Some(oname) = self.window.get(eref).unwrap().onames[odep] else {
                    continue;
                };
                self.rename.clear_matching(oname, eref, odep, spec_mode);

                let links = std::mem::take(&mut self.window.get_mut(eref).unwrap().odeps[odep]);
                for link in links {
                    let Some(consumer) = self.window.get_mut(link.target) else {
                        continue; // stale: consumer was squashed
                    };
                    assert!(
                        !consumer.idep_ready[link.opnum],
                        "output dependence already satisfied"
                    );
                    consumer.idep_ready[link.opnum] = true;
                    let ready = consumer.operands_ready();
                    // Loads are woken by the LSQ refresh scan instead, once
                    // memory ordering allows.
                    let enqueue = ready && (!consumer.in_lsq || consumer.op.is_store());
                    if enqueue {
                        self.enqueue_ready(link.target);
                    }
                }
            }
        }
    }
}
