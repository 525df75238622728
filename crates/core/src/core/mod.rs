//! Core architectural and micro-architectural state.

/// Register bank (integer, floating-point, and control registers).
pub mod regs;
/// Speculative register/memory shadow state and exec-view adapters.
pub mod spec_state;
/// Thread table and fork lineage.
pub mod threads;
