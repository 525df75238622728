//! Fork lifecycle, nested speculation, and sibling survival.

use crate::common::{alternating_branch, alternating_branch_insns, alu_loop, alu_loop_insns, config, off, run};
use forksim_core::config::BpredKind;
use forksim_core::isa::encode::asm;
use pretty_assertions::assert_eq;

#[test]
fn every_loop_mispredict_forks_once() {
    // Under a not-taken predictor every taken loop branch is a detected
    // misprediction, so each one forks a sibling down the correct path.
    let iters = 40;
    let engine = run(&alu_loop(iters), &config(BpredKind::NotTaken, 8));

    assert_eq!(engine.stats.num_forks, iters as u64 - 1);
    assert_eq!(engine.stats.num_nonspec_forks, iters as u64 - 1);
    assert_eq!(engine.stats.num_spec_forks, 0);
    assert_eq!(
        engine.stats.num_forks,
        engine.stats.num_spec_forks + engine.stats.num_nonspec_forks
    );
    // Forking never changes what commits.
    assert_eq!(engine.stats.num_insn, alu_loop_insns(iters as u64));
    assert_eq!(engine.regs.get(1), iters as u64);
}

#[test]
fn forking_matches_single_thread_results() {
    let iters = 40;
    let program = alternating_branch(iters);

    let single = run(&program, &config(BpredKind::Bimod, 1));
    let forked = run(&program, &config(BpredKind::Bimod, 4));

    assert_eq!(single.stats.num_insn, forked.stats.num_insn);
    assert_eq!(single.stats.num_insn, alternating_branch_insns(iters as u64));
    assert_eq!(single.regs.get(3), iters as u64 / 2);
    assert_eq!(forked.regs.get(3), iters as u64 / 2);
    assert_eq!(single.regs.get(1), forked.regs.get(1));
}

#[test]
fn forking_hides_misprediction_latency() {
    // A ~50% mispredicted branch: the forked sibling has been fetching the
    // correct path since dispatch, so resolution costs no fetch restart.
    let program = alternating_branch(60);
    let single = run(&program, &config(BpredKind::Bimod, 1));
    let forked = run(&program, &config(BpredKind::Bimod, 4));

    assert!(forked.stats.num_forks > 0);
    assert!(
        forked.stats.cycles <= single.stats.cycles,
        "forked {} cycles vs single {} cycles",
        forked.stats.cycles,
        single.stats.cycles
    );
}

/// A mispredicted branch whose wrong path contains another mispredicted
/// branch: the parent nests one speculation level deeper and forks a second
/// (speculative) sibling. Recovery at the outer branch must kill the inner
/// fork and the parent's wrong-path work while the outer fork survives.
#[test]
fn nested_mispredict_kills_inner_fork_only() {
    let program = vec![
        asm::li(1, 1),              // 0
        asm::li(2, 1),              // 1
        asm::beq(1, 2, off(2, 6)),  // 2: taken, predicted not-taken
        asm::beq(1, 2, off(3, 5)),  // 3: wrong path, nested mispredict
        asm::add(3, 1, 2),          // 4: doubly wrong path
        asm::add(4, 1, 2),          // 5: inner fork's path
        asm::add(5, 1, 2),          // 6: correct path
        asm::halt(),                // 7
    ];
    let engine = run(&program, &config(BpredKind::NotTaken, 4));

    // One non-speculative fork at the outer branch, one speculative fork at
    // the nested wrong-path branch.
    assert_eq!(engine.stats.num_forks, 2);
    assert_eq!(engine.stats.num_nonspec_forks, 1);
    assert_eq!(engine.stats.num_spec_forks, 1);

    // Only the correct path reached architectural state.
    assert_eq!(engine.regs.get(5), 2);
    assert_eq!(engine.regs.get(3), 0);
    assert_eq!(engine.regs.get(4), 0);
    assert_eq!(engine.stats.num_insn, 5);
}

#[test]
fn exhausted_thread_pool_falls_back_to_inplace_recovery() {
    // With a single thread slot no fork can ever be allocated; the machine
    // must behave exactly like the baseline out-of-order core.
    let iters = 30;
    let engine = run(&alu_loop(iters), &config(BpredKind::NotTaken, 1));

    assert_eq!(engine.stats.num_forks, 0);
    assert_eq!(engine.stats.num_insn, alu_loop_insns(iters as u64));
    assert_eq!(engine.regs.get(1), iters as u64);
}

#[test]
fn wrong_path_stores_never_reach_architectural_memory() {
    let program = vec![
        asm::li(1, 1),              // 0
        asm::li(2, 1),              // 1
        asm::li(4, 0x77),           // 2
        asm::li(5, 0x2000),         // 3
        asm::st(4, 5, 0),           // 4: [0x2000] = 0x77
        asm::beq(1, 2, off(5, 8)),  // 5: taken, predicted not-taken
        asm::st(1, 5, 0),           // 6: wrong path: [0x2000] = 1
        asm::add(6, 1, 2),          // 7: wrong path
        asm::ld(6, 5, 0),           // 8: correct path: load [0x2000]
        asm::halt(),                // 9
    ];
    let engine = run(&program, &config(BpredKind::NotTaken, 4));

    assert_eq!(engine.regs.get(6), 0x77);
    assert_eq!(engine.mem.read(0x2000, 8), 0x77);
    assert!(engine.stats.num_forks >= 1);
}
