//! Dispatch stage: decode, functional execution, rename, allocation, fork.
//!
//! Instructions leave the fetch queue in order and are executed functionally
//! on the spot, against the dispatching thread's architectural or
//! speculative register view — the timing model then runs over the
//! pre-computed trajectory. A detected misprediction is handled at this
//! point: the thread snapshots its shadow state and deepens (or enters)
//! speculation down the predicted path, and the fork controller tries to
//! allocate a sibling thread to fetch the correct path concurrently.
//!
//! Memory operations split into an address-generation entry in the RUU and
//! an access entry in the LSQ, connected through the synthetic transfer
//! register.

use crate::common::error::SimError;
use crate::common::{Addr, INST_BYTES, MAX_IDEPS, MAX_ODEPS};
use crate::isa::{DepName, Inst, Opcode, REG_TMP, decode, flags};
use crate::pipeline::rslink::{DepLink, EntryRef, Queue};
use crate::pipeline::window::WindowEntry;
use crate::sim::engine::Engine;
use tracing::{debug, trace};

impl Engine {
    /// Runs the dispatch stage for one cycle.
    pub(crate) fn dispatch(&mut self) -> Result<(), SimError> {
        let budget = self.decode_width * self.fetch_speed as usize;
        let mut n_dispatched = 0;

        while n_dispatched < budget {
            // Nothing after a dispatched halt reaches the machine.
            if self.halt_seen {
                break;
            }
            if self.window.ruu.is_full() || self.window.lsq.is_full() {
                break;
            }
            let Some(front) = self.fetch_q.front() else {
                break;
            };
            let fe = front.clone();
            if fe.squashed {
                self.fetch_q.pop();
                continue;
            }

            // Strict in-order mode: block until the previous dispatched
            // operation is register-ready.
            if self.inorder_issue {
                if let Some(last) = self.last_dispatched {
                    if let Some(entry) = self.window.get(last) {
                        if !entry.operands_ready() {
                            break;
                        }
                    }
                }
            }

            let thread = fe.thread_id;
            let (spec_mode, spec_level) = {
                let slot = self.threads.slot(thread);
                (slot.spec_mode, slot.spec_level)
            };

            // Wrong-path dispatch disabled: hold mis-speculated instructions
            // until the triggering branch recovers.
            if !self.include_spec && spec_mode {
                break;
            }

            // Decode; bogus bits on a speculative path become a NOP.
            let inst = match decode(fe.inst) {
                Some(inst) => inst,
                None if spec_mode => Inst {
                    op: Opcode::Nop,
                    rd: 0,
                    ra: 0,
                    rb: 0,
                    imm: 0,
                    raw: fe.inst,
                },
                None => {
                    return Err(SimError::IllegalInst {
                        raw: fe.inst,
                        pc: fe.pc,
                    });
                }
            };

            // Serializing operations drain the window first.
            if inst.op.has_flags(flags::TRAP) {
                if !self.window.ruu.is_empty() {
                    break;
                }
                assert!(!spec_mode, "drained and speculative");
            }

            // Functional ahead-of-time execution.
            let exec = if spec_mode {
                self.execute_spec(thread, &inst, fe.pc)?
            } else {
                self.execute_arch(&inst, fe.pc)?
            };

            self.stats.total_insn += 1;
            if !spec_mode {
                self.stats.num_insn += 1;
            }
            if inst.op.has_flags(flags::MEM) {
                self.stats.total_refs += 1;
                if !spec_mode {
                    self.stats.num_refs += 1;
                }
                if inst.op.is_load() {
                    self.stats.total_loads += 1;
                    if !spec_mode {
                        self.stats.num_loads += 1;
                    }
                }
            }
            if inst.op.is_ctrl() {
                self.stats.total_branches += 1;
            }

            if inst.op == Opcode::Halt {
                self.halt_seen = true;
            }

            let fall_through = fe.pc.wrapping_add(INST_BYTES);
            let br_pred_taken = fe.pred_pc != fall_through;
            let mut pred_pc = fe.pred_pc;
            let mut fetch_redirected = false;

            // Perfect-prediction patch-up, or a mis-fetch: a direct control
            // transfer predicted taken to the wrong target. Redirect this
            // thread's fetch immediately; sibling threads' fetched work is
            // untouched.
            let misfetch = inst.op.has_flags(flags::DIRJMP)
                && inst.op.is_ctrl()
                && br_pred_taken
                && exec.target_pc != fe.pred_pc;
            if (self.pred_perfect && fe.pred_pc != exec.next_pc) || misfetch {
                {
                    let slot = self.threads.slot_mut(thread);
                    slot.fetch_pred_pc = exec.next_pc;
                    slot.fetch_regs_pc = exec.next_pc;
                }
                if self.pred_perfect {
                    pred_pc = exec.next_pc;
                }
                self.fetch_q.squash_where(|t| t == thread);
                if !self.pred_perfect {
                    self.fetch_issue_delay = self.mispred_penalty;
                }
                fetch_redirected = true;
                trace!(thread, pc = fe.pc, next_pc = exec.next_pc, "fetch redirected");
            }

            let mut branch_ref = None;
            if inst.op != Opcode::Nop {
                branch_ref = Some(self.install_entry(&fe, &inst, &exec, pred_pc, spec_mode, spec_level));
                n_dispatched += 1;
            }

            // Non-speculative branch bookkeeping and decode-time predictor
            // update.
            if !spec_mode && inst.op.is_ctrl() {
                self.stats.num_branches += 1;
                if self.spec_update == crate::config::SpecUpdate::Id {
                    let taken = exec.next_pc != fall_through;
                    if let Some(pred) = self.pred.as_mut() {
                        pred.update(fe.pc, exec.next_pc, taken, &fe.cookie);
                    }
                }
            }

            // Misprediction detected: deepen (or enter) speculation on this
            // thread, then try to fork a sibling down the correct path.
            if pred_pc != exec.next_pc && !fetch_redirected {
                if let Some(branch) = branch_ref {
                    if spec_mode {
                        let new_level = spec_level + 1;
                        self.threads.slot_mut(thread).spec_level = new_level;
                    } else {
                        let slot = self.threads.slot_mut(thread);
                        slot.spec_mode = true;
                        slot.spec_level = 0;
                    }
                    self.rename.enter_level(thread);
                    self.spec_regs.enter_level(thread, &self.regs);
                    self.window.get_mut(branch).unwrap().recover_inst = true;
                    debug!(
                        thread,
                        pc = fe.pc,
                        level = self.threads.slot(thread).spec_level,
                        "misprediction: entering speculation"
                    );

                    self.try_fork(branch, exec.next_pc);
                }
            }

            self.fetch_q.pop();
        }
        Ok(())
    }

    /// Fills RUU (and, for memory operations, LSQ) stations for one decoded
    /// instruction, links its dependencies, and queues it if ready. Returns
    /// a reference to the RUU entry.
    fn install_entry(
        &mut self,
        fe: &crate::pipeline::fetchq::FetchEntry,
        inst: &Inst,
        exec: &crate::isa::ExecResult,
        pred_pc: Addr,
        spec_mode: bool,
        spec_level: i32,
    ) -> EntryRef {
        let seq = {
            self.inst_seq += 1;
            self.inst_seq
        };
        let fork_counter = self.threads.slot(fe.thread_id).fork_counter;
        let is_mem = inst.op.has_flags(flags::MEM);

        let base = WindowEntry {
            raw_inst: inst.raw,
            op: inst.op,
            pc: fe.pc,
            next_pc: exec.next_pc,
            pred_pc,
            in_lsq: false,
            ea_comp: false,
            recover_inst: false,
            ras_idx: fe.ras_idx,
            cookie: fe.cookie,
            spec_mode,
            spec_level,
            addr: 0,
            tag: 0, // patched to the slot's live tag below
            seq,
            slip_cycle: self.cycle.saturating_sub(1),
            queued: false,
            issued: false,
            completed: false,
            squashed: false,
            onames: [None; MAX_ODEPS],
            odeps: Default::default(),
            idep_ready: [false; MAX_IDEPS],
            thread_id: fe.thread_id,
            fork_counter,
            triggers_fork: false,
            fork_id: 0,
        };

        let ruu_idx = self.window.ruu.tail_index();
        {
            let slot_tag = self.window.ruu.entry(ruu_idx).tag;
            let entry = self.window.ruu.entry_mut(ruu_idx);
            *entry = base.clone();
            entry.tag = slot_tag;
        }
        let ruu_ref = self.window.make_ref(Queue::Ruu, ruu_idx);
        let ins = inst.inputs();
        let outs = inst.outputs();

        if is_mem {
            // Split: the RUU half becomes the address generation, the LSQ
            // half the access. The transfer register carries the address.
            {
                let entry = self.window.ruu.entry_mut(ruu_idx);
                entry.op = Opcode::Agen;
                entry.ea_comp = true;
            }
            let lsq_idx = self.window.lsq.tail_index();
            {
                let slot_tag = self.window.lsq.entry(lsq_idx).tag;
                let entry = self.window.lsq.entry_mut(lsq_idx);
                *entry = base;
                entry.tag = slot_tag;
                entry.in_lsq = true;
                entry.addr = exec.ea;
                entry.seq = {
                    self.inst_seq += 1;
                    self.inst_seq
                };
            }
            let lsq_ref = self.window.make_ref(Queue::Lsq, lsq_idx);

            // Address-generation inputs are the instruction's EA sources.
            self.link_idep(ruu_ref, 0, None, fe.thread_id, spec_mode, spec_level);
            self.link_idep(ruu_ref, 1, ins[1], fe.thread_id, spec_mode, spec_level);
            self.link_idep(ruu_ref, 2, ins[2], fe.thread_id, spec_mode, spec_level);
            self.install_odep(ruu_ref, 0, Some(REG_TMP), fe.thread_id, spec_mode, spec_level);
            self.install_odep(ruu_ref, 1, None, fe.thread_id, spec_mode, spec_level);

            // The access consumes the store value (if any) and the address.
            self.link_idep(lsq_ref, 0, ins[0], fe.thread_id, spec_mode, spec_level);
            self.link_idep(lsq_ref, 1, Some(REG_TMP), fe.thread_id, spec_mode, spec_level);
            self.link_idep(lsq_ref, 2, None, fe.thread_id, spec_mode, spec_level);
            self.install_odep(lsq_ref, 0, outs[0], fe.thread_id, spec_mode, spec_level);
            self.install_odep(lsq_ref, 1, outs[1], fe.thread_id, spec_mode, spec_level);

            self.window.ruu.advance_tail();
            self.window.lsq.advance_tail();

            if self.window.get(ruu_ref).unwrap().operands_ready() {
                self.enqueue_ready(ruu_ref);
            }
            // Dispatch continues once the access itself is register-ready.
            self.last_dispatched = Some(lsq_ref);

            // Stores issue from here; loads wait for the LSQ refresh scan.
            let lsq_entry = self.window.get(lsq_ref).unwrap();
            if inst.op.is_store() && lsq_entry.operands_ready() {
                self.enqueue_ready(lsq_ref);
            }
        } else {
            self.link_idep(ruu_ref, 0, ins[0], fe.thread_id, spec_mode, spec_level);
            self.link_idep(ruu_ref, 1, ins[1], fe.thread_id, spec_mode, spec_level);
            self.link_idep(ruu_ref, 2, ins[2], fe.thread_id, spec_mode, spec_level);
            self.install_odep(ruu_ref, 0, outs[0], fe.thread_id, spec_mode, spec_level);
            self.install_odep(ruu_ref, 1, outs[1], fe.thread_id, spec_mode, spec_level);

            self.window.ruu.advance_tail();

            if self.window.get(ruu_ref).unwrap().operands_ready() {
                self.enqueue_ready(ruu_ref);
                self.last_dispatched = None;
            } else {
                self.last_dispatched = Some(ruu_ref);
            }
        }
        ruu_ref
    }

    /// Connects one input operand of `consumer` to its producer, or marks it
    /// ready when the value already lives in the register file.
    fn link_idep(
        &mut self,
        consumer: EntryRef,
        idep: usize,
        name: Option<DepName>,
        thread: usize,
        spec_mode: bool,
        spec_level: i32,
    ) {
        let Some(name) = name else {
            self.window.get_mut(consumer).unwrap().idep_ready[idep] = true;
            return;
        };
        let creator = self.rename.read(thread, spec_mode, spec_level, name);
        let linked = match creator {
            Some((producer, odep)) if self.window.get(producer).is_some() => {
                self.window.get_mut(producer).unwrap().odeps[odep].push(DepLink {
                    target: consumer,
                    opnum: idep,
                });
                true
            }
            _ => false,
        };
        self.window.get_mut(consumer).unwrap().idep_ready[idep] = !linked;
    }

    /// Publishes `producer` as the latest creator of an output register.
    fn install_odep(
        &mut self,
        producer: EntryRef,
        odep: usize,
        name: Option<DepName>,
        thread: usize,
        spec_mode: bool,
        spec_level: i32,
    ) {
        let entry = self.window.get_mut(producer).unwrap();
        entry.onames[odep] = name;
        entry.odeps[odep].clear();
        if let Some(name) = name {
            self.rename
                .publish(thread, spec_mode, spec_level, name, Some((producer, odep)));
        }
    }

    /// Attempts to allocate a sibling thread that fetches the correct path
    /// of the mispredicted branch at `branch`.
    fn try_fork(&mut self, branch: EntryRef, fork_pc: Addr) {
        let (thread, branch_level, branch_spec, _epoch) = {
            let entry = self.window.get(branch).unwrap();
            (
                entry.thread_id,
                entry.spec_level,
                entry.spec_mode,
                entry.fork_counter,
            )
        };
        let Some(child) = self.threads.find_fork_candidate(thread) else {
            // No slot free: the in-place mis-speculation proceeds alone.
            return;
        };

        self.stats.num_forks += 1;
        self.threads.allocate_fork(child, thread, fork_pc);
        {
            let slot = self.threads.slot_mut(child);
            if branch_spec {
                slot.spec_mode = true;
                slot.spec_level = 0;
            } else {
                slot.spec_mode = false;
                slot.spec_level = -1;
            }
        }
        if branch_spec {
            self.rename.fork_from(child, thread, branch_level);
            self.spec_regs.fork_from(child, thread, branch_level);
            self.stats.num_spec_forks += 1;
        } else {
            self.rename.fork_from(child, thread, -1);
            self.spec_regs.fork_from(child, thread, -1);
            self.stats.num_nonspec_forks += 1;
        }

        // The branch entry moves to the new fork epoch so that recovery on
        // this very branch spares the child it just created.
        let new_epoch = {
            let slot = self.threads.slot_mut(thread);
            slot.fork_counter += 1;
            slot.fork_counter
        };
        let entry = self.window.get_mut(branch).unwrap();
        entry.triggers_fork = true;
        entry.fork_id = child;
        entry.fork_counter = new_epoch;

        self.fetch_issue_delay += self.fork_penalty;
    }
}
