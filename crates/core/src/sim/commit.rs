//! Commit stage.
//!
//! Retires completed entries from the RUU head in program order, up to the
//! commit bandwidth. Squashed entries retire silently — their architectural
//! effect is already void. Stores write to the data cache at this point and
//! must win a store port; a port shortage blocks further commits this
//! cycle. A mispredicted forking branch reaching the head hands the
//! architectural future to its forked sibling and releases its own thread
//! slot.

use crate::common::INST_BYTES;
use crate::config::SpecUpdate;
use crate::isa::{FuClass, Opcode};
use crate::sim::engine::Engine;
use crate::units::cache::MemCmd;
use tracing::debug;

impl Engine {
    /// Runs the commit stage for one cycle.
    pub(crate) fn commit(&mut self) {
        let mut committed = 0;

        while !self.window.ruu.is_empty() && committed < self.commit_width {
            let head_idx = self.window.ruu.head_index();
            let (squashed, completed, ea_comp, spec_mode, triggers_fork, op, pc, next_pc, pred_pc, thread, epoch, slip_cycle, cookie) = {
                let e = self.window.ruu.entry(head_idx);
                (
                    e.squashed,
                    e.completed,
                    e.ea_comp,
                    e.spec_mode,
                    e.triggers_fork,
                    e.op,
                    e.pc,
                    e.next_pc,
                    e.pred_pc,
                    e.thread_id,
                    e.fork_counter,
                    e.slip_cycle,
                    e.cookie,
                )
            };

            if squashed {
                // A squashed head retires without architectural effect,
                // together with its paired LSQ entry.
                if ea_comp {
                    let lsq_head = self.window.lsq.head_index();
                    assert!(
                        self.window.lsq.entry(lsq_head).squashed,
                        "RUU and LSQ squashing out of sync"
                    );
                    self.stats.slip += self.cycle - self.window.lsq.entry(lsq_head).slip_cycle;
                    self.window.lsq.entry_mut(lsq_head).retire();
                    self.window.lsq.retire_head();
                }
                self.stats.slip += self.cycle - slip_cycle;
                self.window.ruu.entry_mut(head_idx).retire();
                self.window.ruu.retire_head();
                committed += 1;
                continue;
            }

            if !completed {
                break;
            }
            assert!(!spec_mode, "speculative instruction committing");

            if triggers_fork && pred_pc != next_pc {
                // The sibling forked at this branch carries the correct
                // path; this thread's slot is done and can be reclaimed.
                debug!(thread, pc, "retiring mispredicted forking branch; slot released");
                self.threads.free_slot(thread);
                self.threads.clear_column(thread);
                self.rename.clear_thread(thread);
                self.spec_regs.clear(thread);
                self.verify_lineage_squashed(head_idx, thread, epoch);
            }

            if ea_comp {
                let lsq_head = self.window.lsq.head_index();
                assert!(
                    !self.window.lsq.is_empty() && self.window.lsq.entry(lsq_head).in_lsq,
                    "RUU out of sync with LSQ"
                );
                if !self.window.lsq.entry(lsq_head).completed {
                    break;
                }
                let lsq_addr = self.window.lsq.entry(lsq_head).addr;
                if self.window.lsq.entry(lsq_head).op.is_store() {
                    // The retiring store needs a write port to reach the
                    // data cache.
                    if self.fu_pool.acquire(FuClass::WrPort).is_none() {
                        break;
                    }
                    if self.memsys.has_dl1() && self.mem.valid_addr(lsq_addr) {
                        let _ = self
                            .memsys
                            .data_access(MemCmd::Write, lsq_addr & !7, 8, self.cycle);
                    }
                    if self.memsys.has_dtlb() && self.mem.valid_addr(lsq_addr) {
                        let _ = self.memsys.dtlb_access(lsq_addr & !7, self.cycle);
                    }
                }
                self.stats.slip += self.cycle - self.window.lsq.entry(lsq_head).slip_cycle;
                self.window.lsq.entry_mut(lsq_head).retire();
                self.window.lsq.retire_head();
            }

            // Commit-time (non-speculative) predictor update.
            if self.spec_update == SpecUpdate::Ct && op.is_ctrl() {
                let taken = next_pc != pc.wrapping_add(INST_BYTES);
                if let Some(pred) = self.pred.as_mut() {
                    pred.update(pc, next_pc, taken, &cookie);
                }
            }

            {
                let entry = self.window.ruu.entry_mut(head_idx);
                entry.retire();
                for chain in &entry.odeps {
                    assert!(chain.is_empty(), "retired instruction has output dependents");
                }
            }
            self.stats.slip += self.cycle - slip_cycle;

            if op == Opcode::Halt {
                self.finished = true;
            }

            self.window.ruu.retire_head();
            committed += 1;
        }
    }
}
