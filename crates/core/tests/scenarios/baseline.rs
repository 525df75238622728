//! Single-thread baseline scenarios.

use crate::common::{alu_loop, alu_loop_insns, config, run};
use forksim_core::config::BpredKind;
use pretty_assertions::assert_eq;

#[test]
fn alu_loop_commits_exactly_and_never_forks() {
    let iters = 100;
    let engine = run(&alu_loop(iters), &config(BpredKind::Bimod, 1));

    assert_eq!(engine.stats.num_insn, alu_loop_insns(iters as u64));
    assert_eq!(engine.stats.num_forks, 0);
    assert_eq!(engine.regs.get(1), iters as u64);
    // Committed work never exceeds dispatched work.
    assert!(engine.stats.num_insn <= engine.stats.total_insn);
}

#[test]
fn alu_loop_sustains_superscalar_ipc() {
    let engine = run(&alu_loop(100), &config(BpredKind::Bimod, 1));
    // Eight independent adds per iteration on a 4-wide machine with a
    // well-predicted backward branch: comfortably above one per cycle.
    assert!(
        engine.stats.ipc() > 1.0,
        "IPC {:.3} below expectation",
        engine.stats.ipc()
    );
}

#[test]
fn perfect_prediction_never_recovers() {
    let iters = 50;
    let engine = run(&alu_loop(iters), &config(BpredKind::Perfect, 1));
    assert_eq!(engine.stats.num_insn, alu_loop_insns(iters as u64));
    assert_eq!(engine.stats.num_forks, 0);
    // With the patch-up path active, no wrong-path work is ever dispatched.
    assert_eq!(engine.stats.num_insn, engine.stats.total_insn);
}

#[test]
fn perfect_prediction_is_fastest() {
    let program = alu_loop(50);
    let perfect = run(&program, &config(BpredKind::Perfect, 1));
    let nottaken = run(&program, &config(BpredKind::NotTaken, 1));
    assert!(perfect.stats.cycles <= nottaken.stats.cycles);
    assert_eq!(perfect.stats.num_insn, nottaken.stats.num_insn);
}

#[test]
fn full_window_stalls_dispatch_but_not_fetch() {
    use forksim_core::isa::encode::asm;
    let mut cfg = config(BpredKind::Bimod, 1);
    cfg.window.ruu_size = 4;
    cfg.window.lsq_size = 2;

    // A dependent divide chain keeps the tiny window full for tens of
    // cycles while fetch keeps filling the fetch queue.
    let mut program = vec![asm::li(1, 1), asm::li(2, 100)];
    for _ in 0..6 {
        program.push(asm::divmod(2, 2, 1));
    }
    program.push(asm::halt());

    let engine = run(&program, &cfg);
    assert_eq!(engine.stats.num_insn, 9);
    assert_eq!(engine.regs.get(2), 100);
    assert!(engine.stats.ruu_full > 0, "window never filled");
    assert!(engine.stats.ifq_full > 0, "fetch was wrongly stalled");
}

#[test]
fn occupancy_counters_accumulate() {
    let engine = run(&alu_loop(50), &config(BpredKind::Bimod, 1));
    assert!(engine.stats.ruu_occupancy > 0);
    assert!(engine.stats.ifq_occupancy > 0);
    assert!(engine.stats.slip > 0);
}
