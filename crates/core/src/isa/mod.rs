//! Instruction set definition consumed by the timing core.
//!
//! The core treats the ISA as a machine-description table: every opcode maps
//! to up to two output register names, up to three input register names, a
//! functional-unit class, a set of flags, and a semantic evaluator. This
//! module provides:
//! 1. **Opcode table:** `Opcode` with per-opcode flags, classes, and deps.
//! 2. **Encoding:** fixed 64-bit instruction words plus assembly helpers.
//! 3. **Execution:** the semantic evaluator, run against an architectural or
//!    speculative register/memory view chosen by the caller.

/// Fixed-width instruction encoding, decoding, and assembly helpers.
pub mod encode;
/// Semantic evaluation of decoded instructions against a register/memory view.
pub mod exec;
/// The opcode table: flags, functional-unit classes, register dependencies.
pub mod opcodes;

pub use encode::{Inst, decode, encode};
pub use exec::{ExecFault, ExecResult, ExecView, execute};
pub use opcodes::{FuClass, Opcode, flags};

/// A logical register name in the unified dependency namespace.
///
/// Names `0..32` are integer registers, `32..64` floating-point registers,
/// then the control registers and the synthetic address-transfer register.
pub type DepName = usize;

/// Number of integer registers.
pub const NUM_IREGS: usize = 32;
/// Number of floating-point registers.
pub const NUM_FREGS: usize = 32;
/// The hardwired-zero integer register.
pub const REG_ZERO: DepName = 0;
/// The link register written by calls.
pub const REG_LINK: DepName = 31;
/// First floating-point register name.
pub const FP_BASE: DepName = 32;
/// The HI control register (division remainder).
pub const REG_HI: DepName = 64;
/// The LO control register.
pub const REG_LO: DepName = 65;
/// Synthetic register carrying an effective address from an address-generation
/// operation to its paired load/store queue entry. Never architecturally
/// visible.
pub const REG_TMP: DepName = 66;
/// Total number of names in the dependency namespace.
pub const NUM_DEP_NAMES: usize = 67;
