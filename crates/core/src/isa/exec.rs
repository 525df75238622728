//! Semantic evaluation.
//!
//! The dispatcher executes every instruction functionally at decode time so
//! the timing model runs over the pre-computed architectural trajectory. The
//! evaluator is routed through an [`ExecView`], which the engine implements
//! twice: once over architectural register/memory state and once over the
//! current thread's speculative shadow state. Faults raised through a
//! speculative view are suppressed by that view; faults surfacing here on a
//! speculative path are zeroed locally.

use crate::common::{Addr, INST_BYTES};
use crate::isa::encode::Inst;
use crate::isa::opcodes::Opcode;
use crate::isa::{DepName, FP_BASE, REG_HI, REG_LINK};

/// Fault raised during functional execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecFault {
    /// Invalid or misaligned memory access.
    Mem(Addr),
    /// Integer division by zero.
    DivideByZero,
}

/// Outcome of functionally executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Architecturally correct next PC.
    pub next_pc: Addr,
    /// Encoded control-transfer target (valid for direct jumps/branches,
    /// taken or not). Zero for non-control instructions.
    pub target_pc: Addr,
    /// Effective address for memory operations, zero otherwise.
    pub ea: Addr,
}

/// Register and memory access routed to architectural or speculative state.
pub trait ExecView {
    /// Reads a register by dependency name.
    fn reg(&self, name: DepName) -> u64;
    /// Writes a register by dependency name.
    fn set_reg(&mut self, name: DepName, val: u64);
    /// Loads `size` bytes. A speculative view suppresses faults and returns
    /// zero instead of `Err`.
    fn load(&mut self, addr: Addr, size: usize) -> Result<u64, ExecFault>;
    /// Stores `size` bytes. A speculative view suppresses faults.
    fn store(&mut self, addr: Addr, size: usize, val: u64) -> Result<(), ExecFault>;
}

/// Executes one decoded instruction.
///
/// On a speculative path (`spec_mode`), arithmetic faults are shunted: the
/// destination registers are zeroed and execution continues, because faults
/// must be masked on mis-speculated trajectories.
pub fn execute(
    inst: &Inst,
    pc: Addr,
    spec_mode: bool,
    view: &mut dyn ExecView,
) -> Result<ExecResult, ExecFault> {
    use Opcode::*;

    let fall_through = pc.wrapping_add(INST_BYTES);
    let mut res = ExecResult {
        next_pc: fall_through,
        target_pc: 0,
        ea: 0,
    };
    let imm = inst.imm as i64 as u64;

    match inst.op {
        Nop | Halt | Agen => {}
        Add => bin_op(inst, view, |a, b| a.wrapping_add(b)),
        Sub => bin_op(inst, view, |a, b| a.wrapping_sub(b)),
        And => bin_op(inst, view, |a, b| a & b),
        Or => bin_op(inst, view, |a, b| a | b),
        Xor => bin_op(inst, view, |a, b| a ^ b),
        Sll => bin_op(inst, view, |a, b| a.wrapping_shl((b & 63) as u32)),
        Srl => bin_op(inst, view, |a, b| a.wrapping_shr((b & 63) as u32)),
        Slt => bin_op(inst, view, |a, b| ((a as i64) < (b as i64)) as u64),
        Mul => bin_op(inst, view, |a, b| a.wrapping_mul(b)),
        Addi => {
            let a = view.reg(inst.ra);
            view.set_reg(inst.rd, a.wrapping_add(imm));
        }
        Li => view.set_reg(inst.rd, imm),
        DivMod => {
            let a = view.reg(inst.ra);
            let b = view.reg(inst.rb);
            if b == 0 {
                if !spec_mode {
                    return Err(ExecFault::DivideByZero);
                }
                view.set_reg(inst.rd, 0);
                view.set_reg(REG_HI, 0);
            } else {
                view.set_reg(inst.rd, a.wrapping_div(b));
                view.set_reg(REG_HI, a.wrapping_rem(b));
            }
        }
        FAdd => fp_op(inst, view, |a, b| a + b),
        FMul => fp_op(inst, view, |a, b| a * b),
        FDiv => fp_op(inst, view, |a, b| a / b),
        FCvt => {
            let a = view.reg(inst.ra) as i64;
            view.set_reg(FP_BASE + inst.rd, (a as f64).to_bits());
        }
        Ld => {
            res.ea = view.reg(inst.ra).wrapping_add(imm);
            let v = view.load(res.ea, 8)?;
            view.set_reg(inst.rd, v);
        }
        St => {
            res.ea = view.reg(inst.ra).wrapping_add(imm);
            let v = view.reg(inst.rd);
            view.store(res.ea, 8, v)?;
        }
        Beq | Bne | Blt => {
            let a = view.reg(inst.ra);
            let b = view.reg(inst.rb);
            let taken = match inst.op {
                Beq => a == b,
                Bne => a != b,
                _ => (a as i64) < (b as i64),
            };
            res.target_pc = pc.wrapping_add(imm);
            if taken {
                res.next_pc = res.target_pc;
            }
        }
        Jmp => {
            res.target_pc = pc.wrapping_add(imm);
            res.next_pc = res.target_pc;
        }
        Jal => {
            res.target_pc = pc.wrapping_add(imm);
            res.next_pc = res.target_pc;
            view.set_reg(REG_LINK, fall_through);
        }
        Jr => {
            res.next_pc = view.reg(inst.ra);
        }
        Ret => {
            res.next_pc = view.reg(REG_LINK);
        }
    }

    Ok(res)
}

fn bin_op(inst: &Inst, view: &mut dyn ExecView, f: impl Fn(u64, u64) -> u64) {
    let a = view.reg(inst.ra);
    let b = view.reg(inst.rb);
    view.set_reg(inst.rd, f(a, b));
}

fn fp_op(inst: &Inst, view: &mut dyn ExecView, f: impl Fn(f64, f64) -> f64) {
    let a = f64::from_bits(view.reg(FP_BASE + inst.ra));
    let b = f64::from_bits(view.reg(FP_BASE + inst.rb));
    view.set_reg(FP_BASE + inst.rd, f(a, b).to_bits());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::encode::{asm, decode};
    use crate::isa::{NUM_DEP_NAMES, REG_ZERO};

    /// Flat test view: a plain register array over a tiny byte store.
    struct FlatView {
        regs: Vec<u64>,
        mem: Vec<u8>,
    }

    impl FlatView {
        fn new() -> Self {
            Self {
                regs: vec![0; NUM_DEP_NAMES],
                mem: vec![0; 4096],
            }
        }
    }

    impl ExecView for FlatView {
        fn reg(&self, name: DepName) -> u64 {
            self.regs[name]
        }
        fn set_reg(&mut self, name: DepName, val: u64) {
            if name != REG_ZERO {
                self.regs[name] = val;
            }
        }
        fn load(&mut self, addr: Addr, size: usize) -> Result<u64, ExecFault> {
            let a = addr as usize;
            if a + size > self.mem.len() {
                return Err(ExecFault::Mem(addr));
            }
            let mut buf = [0u8; 8];
            buf[..size].copy_from_slice(&self.mem[a..a + size]);
            Ok(u64::from_le_bytes(buf))
        }
        fn store(&mut self, addr: Addr, size: usize, val: u64) -> Result<(), ExecFault> {
            let a = addr as usize;
            if a + size > self.mem.len() {
                return Err(ExecFault::Mem(addr));
            }
            self.mem[a..a + size].copy_from_slice(&val.to_le_bytes()[..size]);
            Ok(())
        }
    }

    fn run(word: u64, pc: Addr, view: &mut FlatView) -> ExecResult {
        let inst = decode(word).unwrap();
        execute(&inst, pc, false, view).unwrap()
    }

    #[test]
    fn test_alu_and_fallthrough() {
        let mut v = FlatView::new();
        v.regs[1] = 5;
        v.regs[2] = 7;
        let r = run(asm::add(3, 1, 2), 0x100, &mut v);
        assert_eq!(v.regs[3], 12);
        assert_eq!(r.next_pc, 0x108);
    }

    #[test]
    fn test_divmod_two_outputs() {
        let mut v = FlatView::new();
        v.regs[1] = 17;
        v.regs[2] = 5;
        run(asm::divmod(3, 1, 2), 0, &mut v);
        assert_eq!(v.regs[3], 3);
        assert_eq!(v.regs[REG_HI], 2);
    }

    #[test]
    fn test_div_by_zero_spec_suppressed() {
        let mut v = FlatView::new();
        v.regs[1] = 17;
        let inst = decode(asm::divmod(3, 1, 2)).unwrap();
        assert_eq!(
            execute(&inst, 0, false, &mut v),
            Err(ExecFault::DivideByZero)
        );
        execute(&inst, 0, true, &mut v).unwrap();
        assert_eq!(v.regs[3], 0);
    }

    #[test]
    fn test_branch_taken_and_not() {
        let mut v = FlatView::new();
        v.regs[1] = 1;
        v.regs[2] = 1;
        let r = run(asm::beq(1, 2, -32), 0x200, &mut v);
        assert_eq!(r.next_pc, 0x1E0);
        assert_eq!(r.target_pc, 0x1E0);
        let r = run(asm::bne(1, 2, -32), 0x200, &mut v);
        assert_eq!(r.next_pc, 0x208);
        // Target is still encoded even when not taken.
        assert_eq!(r.target_pc, 0x1E0);
    }

    #[test]
    fn test_call_return() {
        let mut v = FlatView::new();
        let r = run(asm::jal(0x40), 0x100, &mut v);
        assert_eq!(r.next_pc, 0x140);
        assert_eq!(v.regs[REG_LINK], 0x108);
        let r = run(asm::ret(), 0x140, &mut v);
        assert_eq!(r.next_pc, 0x108);
    }

    #[test]
    fn test_store_load() {
        let mut v = FlatView::new();
        v.regs[1] = 0x80;
        v.regs[2] = 0xDEAD;
        let r = run(asm::st(2, 1, 8), 0, &mut v);
        assert_eq!(r.ea, 0x88);
        run(asm::ld(3, 1, 8), 8, &mut v);
        assert_eq!(v.regs[3], 0xDEAD);
    }
}
