//! Shared test harness.

use forksim_core::config::BpredKind;
use forksim_core::isa::encode::asm;
use forksim_core::{Engine, Memory, SimConfig};

/// Load address for all test programs.
pub const BASE: u64 = 0x1000;

/// A configuration with the given predictor and thread count, plus a
/// runaway guard on committed instructions.
pub fn config(bpred: BpredKind, max_threads: usize) -> SimConfig {
    let mut cfg = SimConfig::default();
    cfg.bpred.kind = bpred;
    cfg.threads.max_threads = max_threads;
    cfg.run.max_insts = 500_000;
    cfg
}

/// Loads `words` at [`BASE`], runs the engine to completion (bounded), and
/// returns it for inspection.
pub fn run(words: &[u64], cfg: &SimConfig) -> Engine {
    let mut mem = Memory::new();
    mem.load_program(BASE, words);
    let mut engine = Engine::new(cfg, mem).expect("valid configuration");

    let mut steps = 0u64;
    while !engine.finished() && steps < 2_000_000 {
        engine.step().expect("simulation error");
        steps += 1;
    }
    assert!(engine.finished(), "simulation did not run to completion");
    engine
}

/// Byte offset of a branch from instruction index `from` to index `to`.
pub fn off(from: usize, to: usize) -> i32 {
    ((to as i64 - from as i64) * 8) as i32
}

/// A counted loop of eight independent adds per iteration:
///
/// ```text
///     li   r1, 0
///     li   r2, iters
/// loop:
///     add  r10..r17, r3, r4      (8 instructions)
///     addi r1, r1, 1
///     blt  r1, r2, loop
///     halt
/// ```
///
/// Commits `2 + 10*iters + 1` instructions.
pub fn alu_loop(iters: i32) -> Vec<u64> {
    let mut p = vec![asm::li(1, 0), asm::li(2, iters)];
    let loop_start = p.len();
    for k in 0..8 {
        p.push(asm::add(10 + k, 3, 4));
    }
    p.push(asm::addi(1, 1, 1));
    let branch = p.len();
    p.push(asm::blt(1, 2, off(branch, loop_start)));
    p.push(asm::halt());
    p
}

/// Committed instruction count of [`alu_loop`].
pub fn alu_loop_insns(iters: u64) -> u64 {
    2 + 10 * iters + 1
}

/// A loop with a data-dependent branch taken on even iterations only:
///
/// ```text
///     li   r1, 0          ; i
///     li   r2, iters
///     li   r5, 1
///     li   r3, 0          ; odd-iteration counter
/// loop:
///     and  r4, r1, r5
///     beq  r4, r0, skip   ; even i: skip the increment
///     add  r3, r3, r5
/// skip:
///     addi r1, r1, 1
///     blt  r1, r2, loop
///     halt
/// ```
pub fn alternating_branch(iters: i32) -> Vec<u64> {
    let mut p = vec![
        asm::li(1, 0),
        asm::li(2, iters),
        asm::li(5, 1),
        asm::li(3, 0),
    ];
    let loop_start = p.len(); // 4
    p.push(asm::and(4, 1, 5)); // 4
    p.push(asm::beq(4, 0, off(5, 7))); // 5
    p.push(asm::add(3, 3, 5)); // 6
    p.push(asm::addi(1, 1, 1)); // 7
    p.push(asm::blt(1, 2, off(8, loop_start))); // 8
    p.push(asm::halt()); // 9
    p
}

/// Committed instruction count of [`alternating_branch`] for even `iters`.
pub fn alternating_branch_insns(iters: u64) -> u64 {
    // Even iterations commit 4 instructions, odd ones 5.
    4 + (iters / 2) * 4 + (iters / 2) * 5 + 1
}
