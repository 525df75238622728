//! Shared hardware units: branch prediction, caches, functional units.

/// Branch prediction unit (direction predictors, BTB, RAS).
pub mod bpred;
/// Set-associative cache/TLB timing model.
pub mod cache;
/// Functional-unit resource pool.
pub mod fu;
/// Cache/TLB/DRAM hierarchy latency chaining.
pub mod memsys;
