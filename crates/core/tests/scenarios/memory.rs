//! Store-to-load forwarding and memory-ordering stalls.

use crate::common::{config, run};
use forksim_core::config::BpredKind;
use forksim_core::isa::encode::asm;
use pretty_assertions::assert_eq;

#[test]
fn store_forwards_to_matching_load() {
    let program = vec![
        asm::li(1, 0x2000),
        asm::li(2, 0xAB),
        asm::st(2, 1, 0),
        asm::ld(3, 1, 0),
        asm::halt(),
    ];
    let engine = run(&program, &config(BpredKind::Bimod, 1));
    assert_eq!(engine.regs.get(3), 0xAB);
    assert_eq!(engine.mem.read(0x2000, 8), 0xAB);
}

#[test]
fn forwarded_load_beats_cold_cache_load() {
    // Same shape, but the load in the second program misses the pending
    // store and must take the (cold) cache path instead of the one-cycle
    // LSQ bypass.
    let forwarded = vec![
        asm::li(1, 0x2000),
        asm::li(2, 0xAB),
        asm::st(2, 1, 0),
        asm::ld(3, 1, 0),
        asm::halt(),
    ];
    let through_cache = vec![
        asm::li(1, 0x2000),
        asm::li(2, 0xAB),
        asm::st(2, 1, 0),
        asm::ld(3, 1, 0x100),
        asm::halt(),
    ];
    let fast = run(&forwarded, &config(BpredKind::Bimod, 1));
    let slow = run(&through_cache, &config(BpredKind::Bimod, 1));
    assert!(
        fast.stats.cycles + 5 < slow.stats.cycles,
        "forwarded {} cycles vs cache {} cycles",
        fast.stats.cycles,
        slow.stats.cycles
    );
}

#[test]
fn load_waits_for_unknown_store_address() {
    // The second store's address hangs on a 20-cycle divide; the younger
    // load (to a different address) must not issue past it.
    let stalled = vec![
        asm::li(1, 0x2000),          // 0
        asm::li(2, 0x55),            // 1
        asm::st(2, 1, 0),            // 2: [0x2000] = 0x55
        asm::li(3, 33),              // 3
        asm::li(4, 1),               // 4
        asm::divmod(5, 3, 4),        // 5: r5 = 33, slowly
        asm::st(2, 5, 0x3000 - 33),  // 6: [0x3000] = 0x55, address via r5
        asm::ld(6, 1, 0),            // 7: [0x2000] — blocked until 6 resolves
        asm::halt(),                 // 8
    ];
    let resolved = vec![
        asm::li(1, 0x2000),
        asm::li(2, 0x55),
        asm::st(2, 1, 0),
        asm::li(3, 33),
        asm::li(4, 1),
        asm::addi(5, 3, 0),          // fast address producer
        asm::st(2, 5, 0x3000 - 33),
        asm::ld(6, 1, 0),
        asm::halt(),
    ];
    let slow = run(&stalled, &config(BpredKind::Bimod, 1));
    let fast = run(&resolved, &config(BpredKind::Bimod, 1));

    // Both see the original value: the blocking store is to another address.
    assert_eq!(slow.regs.get(6), 0x55);
    assert_eq!(fast.regs.get(6), 0x55);
    assert_eq!(slow.mem.read(0x3000, 8), 0x55);
    assert!(
        slow.stats.cycles > fast.stats.cycles + 8,
        "stalled {} cycles vs resolved {} cycles",
        slow.stats.cycles,
        fast.stats.cycles
    );
}

#[test]
fn stores_commit_to_memory_in_program_order() {
    let program = vec![
        asm::li(1, 0x2000),
        asm::li(2, 1),
        asm::li(3, 2),
        asm::st(2, 1, 0),
        asm::st(3, 1, 0),
        asm::ld(4, 1, 0),
        asm::halt(),
    ];
    let engine = run(&program, &config(BpredKind::Bimod, 1));
    assert_eq!(engine.regs.get(4), 2);
    assert_eq!(engine.mem.read(0x2000, 8), 2);
}

#[test]
fn sibling_store_does_not_forward_across_threads() {
    // The wrong-path store to the load's address lives in a dead lineage;
    // the correct-path load must read architectural memory instead.
    let program = vec![
        asm::li(1, 1),                              // 0
        asm::li(5, 0x2000),                         // 1
        asm::li(4, 0x77),                           // 2
        asm::st(4, 5, 0),                           // 3: [0x2000] = 0x77
        asm::beq(1, 1, crate::common::off(4, 7)),   // 4: always taken, predicted not-taken
        asm::st(1, 5, 0),                           // 5: wrong path: [0x2000] = 1
        asm::add(7, 1, 1),                          // 6: wrong path
        asm::ld(6, 5, 0),                           // 7: correct path
        asm::halt(),                                // 8
    ];
    let engine = run(&program, &config(BpredKind::NotTaken, 4));
    assert_eq!(engine.regs.get(6), 0x77);
    assert_eq!(engine.mem.read(0x2000, 8), 0x77);
}
