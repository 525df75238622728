//! Fetch arbiter and fetch stage.
//!
//! Fetches up to `decode_width × fetch_speed` instructions per cycle, round-
//! robin across live threads under a per-thread quota. Each fetch consults
//! the I-cache and I-TLB in parallel; a miss stalls fetch for the residual
//! latency. Control instructions are pre-decoded for a predictor lookup, and
//! one taken branch per thread terminates the cycle's fetch group.

use crate::common::INST_BYTES;
use crate::isa::{Inst, decode, flags};
use crate::pipeline::fetchq::FetchEntry;
use crate::sim::engine::Engine;
use crate::units::bpred::DirCookie;

impl Engine {
    /// Runs the fetch stage for one cycle.
    pub(crate) fn fetch(&mut self) {
        if self.halt_seen {
            return;
        }
        let budget = self.decode_width * self.fetch_speed as usize;
        let mut branch_cnt = 0u64;

        for _ in 0..budget {
            if self.fetch_q.is_full() {
                break;
            }

            // Quota expiry or an ineligible current thread moves the arbiter
            // to the next live, fetching thread in round-robin order.
            let current_ok = {
                let slot = self.threads.slot(self.current_fetch_thread);
                self.fetches_left > 0 && slot.in_use && slot.keep_fetching
            };
            if !current_ok {
                match self.threads.next_fetch_thread(self.current_fetch_thread) {
                    Some(t) => {
                        self.current_fetch_thread = t;
                        self.fetches_left = self.fetch_quota;
                    }
                    None => panic!("no fetch-eligible threads"),
                }
            }
            self.fetches_left -= 1;
            let thread = self.current_fetch_thread;

            let pc = self.threads.slot(thread).fetch_pred_pc;
            self.threads.slot_mut(thread).fetch_regs_pc = pc;

            let inst = if self.mem.valid_text_addr(pc) {
                let word = self.mem.fetch_inst(pc);
                let base_lat = self.memsys.il1_hit_lat();
                let cache_lat = self.memsys.inst_access(pc, INST_BYTES, self.cycle);
                let tlb_lat = self.memsys.itlb_access(pc, self.cycle);
                // I-cache and I-TLB are probed in parallel.
                let lat = cache_lat.max(tlb_lat);
                if lat > base_lat {
                    // Miss: block fetch until the line arrives.
                    self.fetch_issue_delay += lat - 1;
                    break;
                }
                word
            } else {
                // Bogus fetch PC on a mis-speculated path: feed a NOP.
                Inst::NOP
            };

            // Predict the next fetch address.
            let mut pred_pc = pc.wrapping_add(INST_BYTES);
            let mut cookie = DirCookie::default();
            let mut ras_idx = 0;
            if let Some(pred) = self.pred.as_mut() {
                if let Some(di) = decode(inst) {
                    if di.op.is_ctrl() {
                        let lookup = pred.lookup(
                            pc,
                            di.op.has_flags(flags::CALL),
                            di.op.has_flags(flags::RET),
                            !di.op.is_cond_branch(),
                        );
                        cookie = lookup.cookie;
                        ras_idx = lookup.ras_idx;
                        if let Some(target) = lookup.pred_pc {
                            pred_pc = target;
                            // Non-sequential fetch: one taken branch per
                            // cycle per thread.
                            branch_cnt += 1;
                        }
                    }
                }
            }
            self.threads.slot_mut(thread).fetch_pred_pc = pred_pc;

            self.fetch_q.push(FetchEntry {
                inst,
                pc,
                pred_pc,
                cookie,
                ras_idx,
                thread_id: thread,
                squashed: false,
            });

            if branch_cnt >= self.fetch_speed {
                break;
            }
        }
    }
}
