//! The engine: owner of all machine state and the per-cycle driver.

use crate::common::error::{ConfigError, SimError};
use crate::common::{Addr, Cycle, INST_BYTES};
use crate::config::{SimConfig, SpecUpdate};
use crate::core::regs::RegBank;
use crate::core::spec_state::{ArchView, SpecMem, SpecRegs, SpecView};
use crate::core::threads::ThreadTable;
use crate::isa::{ExecFault, ExecResult, Inst, Opcode, decode, execute};
use crate::mem::Memory;
use crate::pipeline::eventq::EventQueue;
use crate::pipeline::fetchq::FetchQueue;
use crate::pipeline::readyq::ReadyQueue;
use crate::pipeline::rename::CreateVector;
use crate::pipeline::rslink::EntryRef;
use crate::pipeline::window::Window;
use crate::stats::SimStats;
use crate::units::bpred::Predictor;
use crate::units::fu::FuPool;
use crate::units::memsys::MemSys;
use crate::isa::flags;

/// The whole simulated machine.
pub struct Engine {
    // Bandwidths and policies, fixed at construction.
    pub(crate) decode_width: usize,
    pub(crate) issue_width: usize,
    pub(crate) commit_width: usize,
    pub(crate) fetch_speed: u64,
    pub(crate) mispred_penalty: u64,
    pub(crate) inorder_issue: bool,
    pub(crate) include_spec: bool,
    pub(crate) fetch_quota: u64,
    pub(crate) fork_penalty: u64,
    pub(crate) pred_perfect: bool,
    pub(crate) spec_update: SpecUpdate,
    max_insts: u64,

    /// Simulated memory.
    pub mem: Memory,
    /// Architectural register file.
    pub regs: RegBank,
    /// Speculative register shadows.
    pub spec_regs: SpecRegs,
    /// Speculative store table.
    pub spec_mem: SpecMem,
    /// Thread slots and fork lineage.
    pub threads: ThreadTable,
    /// RUU and LSQ.
    pub window: Window,
    /// Create vector (renaming).
    pub rename: CreateVector,
    /// Fetch → dispatch queue.
    pub fetch_q: FetchQueue,
    /// Ready instruction queue.
    pub ready_q: ReadyQueue,
    /// Completion event queue.
    pub event_q: EventQueue,
    /// Functional-unit pool.
    pub fu_pool: FuPool,
    /// Cache/TLB/DRAM latency model.
    pub memsys: MemSys,
    /// Branch predictor (`None` under perfect prediction).
    pub pred: Option<Predictor>,
    /// Statistics counters.
    pub stats: SimStats,
    /// Current cycle.
    pub cycle: Cycle,

    pub(crate) inst_seq: u64,
    pub(crate) fetch_issue_delay: u64,
    pub(crate) current_fetch_thread: usize,
    pub(crate) fetches_left: u64,
    pub(crate) last_dispatched: Option<EntryRef>,
    pub(crate) halt_seen: bool,
    pub(crate) finished: bool,
    start_pc: Addr,
}

impl Engine {
    /// Builds an engine over a loaded memory image. The configuration is
    /// validated first; timing starts at the program entry point.
    pub fn new(cfg: &SimConfig, mem: Memory) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let max_threads = cfg.threads.max_threads;
        let pred_perfect = cfg.bpred.kind == crate::config::BpredKind::Perfect;
        let start_pc = mem.entry();

        let mut engine = Self {
            decode_width: cfg.width.decode,
            issue_width: cfg.width.issue,
            commit_width: cfg.width.commit,
            fetch_speed: cfg.fetch.speed,
            mispred_penalty: cfg.fetch.mispred_penalty,
            inorder_issue: cfg.width.inorder_issue,
            include_spec: cfg.width.include_spec,
            fetch_quota: cfg.threads.max_fetches_before_switch,
            fork_penalty: cfg.threads.fork_penalty,
            pred_perfect,
            spec_update: cfg.bpred.spec_update,
            max_insts: cfg.run.max_insts,
            mem,
            regs: RegBank::new(),
            spec_regs: SpecRegs::new(max_threads),
            spec_mem: SpecMem::new(),
            threads: ThreadTable::new(max_threads),
            window: Window::new(cfg.window.ruu_size, cfg.window.lsq_size),
            rename: CreateVector::new(max_threads),
            fetch_q: FetchQueue::new(cfg.fetch.ifq_size),
            ready_q: ReadyQueue::new(),
            event_q: EventQueue::new(),
            fu_pool: FuPool::new(&cfg.res),
            memsys: MemSys::new(&cfg.mem),
            pred: (!pred_perfect).then(|| Predictor::new(&cfg.bpred)),
            stats: SimStats::default(),
            cycle: 0,
            inst_seq: 0,
            fetch_issue_delay: 0,
            current_fetch_thread: 0,
            fetches_left: cfg.threads.max_fetches_before_switch,
            last_dispatched: None,
            halt_seen: false,
            finished: false,
            start_pc,
        };
        engine.seed_fetch();
        Ok(engine)
    }

    /// Points thread 0's fetch at the current start PC.
    fn seed_fetch(&mut self) {
        let slot = self.threads.slot_mut(0);
        slot.fetch_pred_pc = self.start_pc;
        slot.fetch_regs_pc = self.start_pc.wrapping_sub(INST_BYTES);
    }

    /// True once the program has halted.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Functionally executes `count` instructions before timing starts.
    pub fn fast_forward(&mut self, count: u64) -> Result<(), SimError> {
        let mut pc = self.start_pc;
        for _ in 0..count {
            let raw = self.mem.fetch_inst(pc);
            let inst = decode(raw).ok_or(SimError::IllegalInst { raw, pc })?;
            if inst.op == Opcode::Halt {
                self.finished = true;
                break;
            }
            let res = self.execute_arch(&inst, pc)?;
            pc = res.next_pc;
        }
        self.start_pc = pc;
        self.seed_fetch();
        Ok(())
    }

    /// Runs until the program halts or the instruction budget is spent.
    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.finished {
            self.step()?;
            if self.max_insts > 0 && self.stats.num_insn >= self.max_insts {
                break;
            }
        }
        Ok(())
    }

    /// Advances the machine one cycle: all pipeline phases in reverse order,
    /// then occupancy accounting.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.sanity_checks();

        self.commit();
        self.fu_pool.release_tick();
        self.writeback();
        self.lsq_refresh()?;
        self.issue();
        self.dispatch()?;

        if self.fetch_issue_delay == 0 {
            self.fetch();
        } else {
            self.fetch_issue_delay -= 1;
        }

        self.stats.ifq_occupancy += self.fetch_q.len() as u64;
        self.stats.ifq_full += u64::from(self.fetch_q.is_full());
        self.stats.ruu_occupancy += self.window.ruu.len() as u64;
        self.stats.ruu_full += u64::from(self.window.ruu.is_full());
        self.stats.lsq_occupancy += self.window.lsq.len() as u64;
        self.stats.lsq_full += u64::from(self.window.lsq.is_full());

        self.cycle += 1;
        self.stats.cycles = self.cycle;
        Ok(())
    }

    /// Window descriptor invariants, checked at the top of every cycle.
    fn sanity_checks(&self) {
        assert!(
            self.window.ruu.len() >= self.window.lsq.len(),
            "RUU_num < LSQ_num"
        );
        assert!(self.window.ruu.is_consistent(), "RUU head/tail wedged");
        assert!(self.window.lsq.is_consistent(), "LSQ head/tail wedged");
    }

    /// Functional execution against architectural state; faults are fatal.
    pub(crate) fn execute_arch(&mut self, inst: &Inst, pc: Addr) -> Result<ExecResult, SimError> {
        let mut view = ArchView {
            regs: &mut self.regs,
            mem: &mut self.mem,
        };
        execute(inst, pc, false, &mut view).map_err(|f| fault_to_error(f, pc))
    }

    /// Functional execution against a thread's speculative shadow; faults
    /// are suppressed by the view.
    pub(crate) fn execute_spec(
        &mut self,
        thread: usize,
        inst: &Inst,
        pc: Addr,
    ) -> Result<ExecResult, SimError> {
        let bank = self.spec_regs.top_mut(thread);
        let mut view = SpecView {
            bank,
            spec_mem: &mut self.spec_mem,
            mem: &self.mem,
        };
        execute(inst, pc, true, &mut view).map_err(|f| fault_to_error(f, pc))
    }

    /// Inserts an operation into the ready queue under the issue priority
    /// policy, marking it queued.
    ///
    /// # Panics
    ///
    /// Panics if the entry is already queued or the reference is stale.
    pub(crate) fn enqueue_ready(&mut self, eref: EntryRef) {
        let entry = self
            .window
            .get_mut(eref)
            .expect("ready enqueue of a stale entry");
        assert!(!entry.queued, "node is already queued");
        entry.queued = true;
        let critical = entry.in_lsq || entry.op.has_flags(flags::LONGLAT | flags::CTRL);
        let seq = entry.seq;
        self.ready_q.insert(eref, seq, critical);
    }
}

fn fault_to_error(fault: ExecFault, pc: Addr) -> SimError {
    match fault {
        ExecFault::Mem(addr) => SimError::MemFault { addr, pc },
        ExecFault::DivideByZero => SimError::DivideByZero { pc },
    }
}
