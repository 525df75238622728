//! Error types for the simulator.
//!
//! Two fatal error families exist:
//! 1. **`ConfigError`** — rejected at start-up, before any state is built.
//! 2. **`SimError`** — raised mid-simulation for conditions the core does not
//!    recover from (non-speculative faults, undersized pools).
//!
//! Invariant violations (queue desync, speculative commit, double FU grab)
//! are implementation bugs and panic instead of returning an error.
//! Speculative-path faults are suppressed at the access layer and never
//! surface as either type.

use crate::common::Addr;
use thiserror::Error;

/// Fatal configuration error, reported before simulation starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A parameter that must be a power of two is not.
    #[error("{name} must be a power of two (got {value})")]
    NotPowerOfTwo {
        /// Option name.
        name: &'static str,
        /// Offending value.
        value: u64,
    },

    /// A parameter that must be non-zero is zero.
    #[error("{0} must be non-zero")]
    Zero(&'static str),

    /// A parameter is outside its permitted range.
    #[error("{name} out of range: {value} (max {max})")]
    OutOfRange {
        /// Option name.
        name: &'static str,
        /// Offending value.
        value: u64,
        /// Permitted maximum.
        max: u64,
    },

    /// A window size is below the architectural minimum.
    #[error("{name} must be at least {min} (got {value})")]
    TooSmall {
        /// Option name.
        name: &'static str,
        /// Offending value.
        value: u64,
        /// Permitted minimum.
        min: u64,
    },

    /// An enumerated option was given an unknown name.
    #[error("unknown {what}: `{got}`")]
    UnknownName {
        /// Option kind being parsed.
        what: &'static str,
        /// The unrecognized value.
        got: String,
    },
}

/// Fatal simulation error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// A non-speculative instruction touched an invalid or misaligned address.
    #[error("non-speculative memory fault at {addr:#x} (pc {pc:#x})")]
    MemFault {
        /// Faulting effective address.
        addr: Addr,
        /// PC of the faulting instruction.
        pc: Addr,
    },

    /// A non-speculative instruction carried undecodable opcode bits.
    #[error("illegal instruction {raw:#018x} at pc {pc:#x}")]
    IllegalInst {
        /// Raw instruction word.
        raw: u64,
        /// PC of the instruction.
        pc: Addr,
    },

    /// A non-speculative integer division by zero.
    #[error("integer division by zero at pc {pc:#x}")]
    DivideByZero {
        /// PC of the instruction.
        pc: Addr,
    },

    /// The per-thread unknown-store-address list overflowed.
    ///
    /// This means the configured LSQ is larger than the scan bound supports;
    /// it is a sizing problem, not a runtime condition.
    #[error("unknown-store-address list overflow on thread {thread} (limit {limit})")]
    StdUnknownOverflow {
        /// Thread whose list overflowed.
        thread: usize,
        /// The compiled-in bound.
        limit: usize,
    },
}
