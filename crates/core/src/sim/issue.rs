//! LSQ refresh (memory dependence scheduling) and the issue stage.
//!
//! `lsq_refresh` walks the LSQ in age order and wakes loads whose memory
//! ordering conditions hold. Two per-thread structures gate a load: the
//! thread's `still_valid` flag (false once any store with an unknown address
//! precedes it on the thread's dependency cone) and a bounded list of
//! resolved store addresses whose data is still unknown. Conditions recorded
//! on a thread are mirrored into every live descendant forked at or past the
//! recording store's epoch.
//!
//! `issue` drains the ready queue under the issue bandwidth, acquiring
//! functional units. Stores complete in zero time into the LSQ; loads charge
//! `max(D-cache, D-TLB)` unless an earlier same-path store at the same
//! address forwards in one cycle. Operations that fail to acquire a unit
//! re-enter the ready queue.

use crate::common::error::SimError;
use crate::common::{Addr, MAX_STD_UNKNOWNS};
use crate::pipeline::rslink::Queue;
use crate::sim::engine::Engine;
use crate::units::cache::MemCmd;

impl Engine {
    /// Wakes loads whose register and memory dependencies are satisfied.
    pub(crate) fn lsq_refresh(&mut self) -> Result<(), SimError> {
        let nthreads = self.threads.max_threads();
        let mut still_valid = vec![true; nthreads];
        let mut unknowns: Vec<Vec<Addr>> = vec![Vec::new(); nthreads];

        let indices: Vec<usize> = self.window.lsq.indices().collect();
        for idx in indices {
            let (op, squashed, thread, epoch, addr, addr_ready, ops_ready, queued, issued, completed) = {
                let e = self.window.lsq.entry(idx);
                (
                    e.op,
                    e.squashed,
                    e.thread_id,
                    e.fork_counter,
                    e.addr,
                    e.store_addr_ready(),
                    e.operands_ready(),
                    e.queued,
                    e.issued,
                    e.completed,
                )
            };
            // Squashed accesses impose no ordering.
            if squashed {
                continue;
            }

            if op.is_store() {
                if !addr_ready {
                    // Unknown store address: no later load on this path may
                    // speculate past it.
                    still_valid[thread] = false;
                    for t in 0..nthreads {
                        if self.threads.slot(t).in_use && self.threads.descends(t, thread, epoch) {
                            still_valid[t] = false;
                        }
                    }
                } else if !ops_ready {
                    // Address known, data unknown: later loads at this
                    // address must wait.
                    push_unknown(&mut unknowns, thread, addr)?;
                    for t in 0..nthreads {
                        if self.threads.slot(t).in_use && self.threads.descends(t, thread, epoch) {
                            push_unknown(&mut unknowns, t, addr)?;
                        }
                    }
                } else {
                    // Fully resolved: clear its address from the lists.
                    clear_unknown(&mut unknowns[thread], addr);
                    for t in 0..nthreads {
                        if self.threads.slot(t).in_use && self.threads.descends(t, thread, epoch) {
                            clear_unknown(&mut unknowns[t], addr);
                        }
                    }
                }
            }

            if op.is_load()
                && !queued
                && !issued
                && !completed
                && ops_ready
                && still_valid[thread]
                && !unknowns[thread].contains(&addr)
            {
                let lsq_ref = self.window.make_ref(Queue::Lsq, idx);
                self.enqueue_ready(lsq_ref);
            }
        }
        Ok(())
    }

    /// Issues ready operations to functional units.
    pub(crate) fn issue(&mut self) {
        // The ready list is reclaimed whole each cycle; anything not issued
        // is re-inserted through the normal policy so ordering stays exact.
        let nodes = self.ready_q.drain_all();
        let mut n_issued = 0;
        let mut iter = nodes.into_iter();

        for node in iter.by_ref() {
            if n_issued >= self.issue_width {
                // Bandwidth exhausted: re-queue this node and fall through
                // to re-queue the rest.
                self.requeue(node.target);
                break;
            }

            let Some(entry) = self.window.get(node.target) else {
                continue; // squashed since enqueue
            };
            if entry.squashed {
                continue;
            }
            assert!(
                entry.operands_ready() && entry.queued && !entry.issued && !entry.completed,
                "issued inst not ready, already issued, or completed"
            );

            let (in_lsq, op, addr, thread, recover_inst) = (
                entry.in_lsq,
                entry.op,
                entry.addr,
                entry.thread_id,
                entry.recover_inst,
            );
            self.window.get_mut(node.target).unwrap().queued = false;

            if in_lsq && op.is_store() {
                // Stores complete in effectively zero time: the value lands
                // in the LSQ now and reaches the cache at commit.
                assert!(!recover_inst, "mis-predicted store");
                let entry = self.window.get_mut(node.target).unwrap();
                assert!(
                    entry.onames.iter().all(Option::is_none),
                    "store creates a result"
                );
                entry.issued = true;
                entry.completed = true;
                n_issued += 1;
                continue;
            }

            match op.fu_class() {
                Some(class) => match self.fu_pool.acquire(class) {
                    Some(timing) => {
                        self.window.get_mut(node.target).unwrap().issued = true;
                        let latency = if in_lsq && op.is_load() {
                            self.load_latency(node.target.index, addr, thread, timing.oplat)
                        } else {
                            timing.oplat
                        };
                        self.event_q
                            .schedule(node.target, self.cycle + latency, self.cycle);
                        n_issued += 1;
                    }
                    None => {
                        // No unit free this cycle; try again next cycle.
                        self.requeue(node.target);
                    }
                },
                None => {
                    // No functional unit required.
                    self.window.get_mut(node.target).unwrap().issued = true;
                    self.event_q
                        .schedule(node.target, self.cycle + 1, self.cycle);
                    n_issued += 1;
                }
            }
        }

        for node in iter {
            self.requeue(node.target);
        }
    }

    /// Re-inserts an un-issued operation into the ready queue.
    fn requeue(&mut self, target: crate::pipeline::rslink::EntryRef) {
        if self.window.get(target).is_some() {
            self.window.get_mut(target).unwrap().queued = false;
            self.enqueue_ready(target);
        }
    }

    /// Computes a load's completion latency: LSQ store forwarding first,
    /// then the data cache and TLB in parallel.
    fn load_latency(&mut self, lsq_index: usize, addr: Addr, thread: usize, oplat: u64) -> u64 {
        let mut latency = 0;

        // Scan back toward the LSQ head for an earlier store to the same
        // address on this load's own path.
        let head = self.window.lsq.head_index();
        let mut idx = lsq_index;
        while idx != head {
            idx = self.window.lsq.prev_index(idx);
            let e = self.window.lsq.entry(idx);
            if e.squashed {
                continue;
            }
            if e.op.is_store()
                && e.addr == addr
                && self.threads.is_ancestral(e.thread_id, e.fork_counter, thread)
            {
                latency = 1;
                break;
            }
        }

        let valid = self.mem.valid_addr(addr);
        if latency == 0 {
            if !self.threads.slot(thread).spec_mode && !valid {
                self.stats.invalid_addrs += 1;
            }
            latency = if self.memsys.has_dl1() && valid {
                self.memsys
                    .data_access(MemCmd::Read, addr & !7, 8, self.cycle)
            } else {
                oplat
            };
        }

        if self.memsys.has_dtlb() && valid {
            let tlb = self.memsys.dtlb_access(addr & !7, self.cycle);
            // D-cache and D-TLB accesses occur in parallel.
            latency = latency.max(tlb);
        }
        latency
    }
}

fn push_unknown(unknowns: &mut [Vec<Addr>], thread: usize, addr: Addr) -> Result<(), SimError> {
    if unknowns[thread].len() >= MAX_STD_UNKNOWNS {
        return Err(SimError::StdUnknownOverflow {
            thread,
            limit: MAX_STD_UNKNOWNS,
        });
    }
    unknowns[thread].push(addr);
    Ok(())
}

fn clear_unknown(list: &mut [Addr], addr: Addr) {
    for slot in list.iter_mut() {
        if *slot == addr {
            *slot = 0;
        }
    }
}
