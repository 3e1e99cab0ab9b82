//! Typed constructors for every instruction category in spec.md §4.1,
//! each producing an [`Item`] ready to drop into a builder sequence.

use crate::assembler::{Item, LabelName};
use crate::error::ConstructionError;
use crate::insn::{alu_op, atomic_op, class, jmp_op, mode, pseudo, size, src_mode, Instruction};
use crate::reg::IntoReg;

/// Either a concrete PC-relative displacement or a label name to resolve
/// during assembly.
pub enum JumpTarget {
    Offset(i16),
    Label(LabelName),
}

impl From<i16> for JumpTarget {
    fn from(v: i16) -> Self {
        JumpTarget::Offset(v)
    }
}
impl From<&str> for JumpTarget {
    fn from(v: &str) -> Self {
        JumpTarget::Label(v.to_string())
    }
}
impl From<String> for JumpTarget {
    fn from(v: String) -> Self {
        JumpTarget::Label(v)
    }
}

fn jump_item(opcode: u8, target: impl Into<JumpTarget>) -> Item {
    match target.into() {
        JumpTarget::Offset(off) => {
            Item::Instr(Instruction::new(opcode, 0, 0, off, 0).expect("jmp operands always valid"))
        }
        JumpTarget::Label(name) => {
            let insn = Instruction::new(opcode, 0, 0, 0, 0).expect("jmp operands always valid");
            Item::PendingJump(insn, name)
        }
    }
}

// ---------------------------------------------------------------- ALU ----

macro_rules! alu_builder {
    ($name_imm:ident, $name_reg:ident, $op:expr, $class:expr) => {
        pub fn $name_imm(dst: impl IntoReg, imm: i32) -> Result<Item, ConstructionError> {
            let dst = dst.into_reg()?.as_u8();
            Ok(Item::Instr(Instruction::new(
                $class | src_mode::K | $op,
                dst,
                0,
                0,
                imm,
            )?))
        }

        pub fn $name_reg(dst: impl IntoReg, src: impl IntoReg) -> Result<Item, ConstructionError> {
            let dst = dst.into_reg()?.as_u8();
            let src = src.into_reg()?.as_u8();
            Ok(Item::Instr(Instruction::new(
                $class | src_mode::X | $op,
                dst,
                src,
                0,
                0,
            )?))
        }
    };
}

alu_builder!(add64, add64_reg, alu_op::ADD, class::ALU64);
alu_builder!(sub64, sub64_reg, alu_op::SUB, class::ALU64);
alu_builder!(mul64, mul64_reg, alu_op::MUL, class::ALU64);
alu_builder!(div64, div64_reg, alu_op::DIV, class::ALU64);
alu_builder!(or64, or64_reg, alu_op::OR, class::ALU64);
alu_builder!(and64, and64_reg, alu_op::AND, class::ALU64);
alu_builder!(lsh64, lsh64_reg, alu_op::LSH, class::ALU64);
alu_builder!(rsh64, rsh64_reg, alu_op::RSH, class::ALU64);
alu_builder!(mod64, mod64_reg, alu_op::MOD, class::ALU64);
alu_builder!(xor64, xor64_reg, alu_op::XOR, class::ALU64);
alu_builder!(mov, mov_reg, alu_op::MOV, class::ALU64);
alu_builder!(arsh64, arsh64_reg, alu_op::ARSH, class::ALU64);

alu_builder!(add32, add32_reg, alu_op::ADD, class::ALU);
alu_builder!(sub32, sub32_reg, alu_op::SUB, class::ALU);
alu_builder!(mul32, mul32_reg, alu_op::MUL, class::ALU);
alu_builder!(div32, div32_reg, alu_op::DIV, class::ALU);
alu_builder!(or32, or32_reg, alu_op::OR, class::ALU);
alu_builder!(and32, and32_reg, alu_op::AND, class::ALU);
alu_builder!(lsh32, lsh32_reg, alu_op::LSH, class::ALU);
alu_builder!(rsh32, rsh32_reg, alu_op::RSH, class::ALU);
alu_builder!(mod32, mod32_reg, alu_op::MOD, class::ALU);
alu_builder!(xor32, xor32_reg, alu_op::XOR, class::ALU);
alu_builder!(mov32, mov32_reg, alu_op::MOV, class::ALU);
alu_builder!(arsh32, arsh32_reg, alu_op::ARSH, class::ALU);

/// `neg` has no source operand; only the 64-bit and 32-bit unary forms
/// exist.
pub fn neg64(dst: impl IntoReg) -> Result<Item, ConstructionError> {
    let dst = dst.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::ALU64 | alu_op::NEG,
        dst,
        0,
        0,
        0,
    )?))
}

pub fn neg32(dst: impl IntoReg) -> Result<Item, ConstructionError> {
    let dst = dst.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::ALU | alu_op::NEG,
        dst,
        0,
        0,
        0,
    )?))
}

/// Endianness conversion: `imm` carries the bit width (16/32/64).
/// `to_le` uses the immediate-source-mode bit clear; `to_be` sets it.
pub fn to_le(dst: impl IntoReg, bits: u32) -> Result<Item, ConstructionError> {
    let dst = dst.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::ALU | src_mode::K | alu_op::END,
        dst,
        0,
        0,
        bits as i32,
    )?))
}

pub fn to_be(dst: impl IntoReg, bits: u32) -> Result<Item, ConstructionError> {
    let dst = dst.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::ALU | src_mode::X | alu_op::END,
        dst,
        0,
        0,
        bits as i32,
    )?))
}

// ------------------------------------------------------------- Memory ----

/// `ldx dst, [src + offset]` -- load `n_bytes` from `src + offset` into
/// `dst`.
pub fn ldx(
    dst: impl IntoReg,
    src: impl IntoReg,
    offset: i16,
    n_bytes: u8,
) -> Result<Item, ConstructionError> {
    let sz = size::of_bytes(n_bytes).ok_or(ConstructionError::InvalidSize(n_bytes))?;
    let dst = dst.into_reg()?.as_u8();
    let src = src.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::LDX | sz | mode::MEM,
        dst,
        src,
        offset,
        0,
    )?))
}

/// `*(size *)(dst + offset) = src` -- store register `src` to memory.
pub fn stx(
    dst: impl IntoReg,
    offset: i16,
    src: impl IntoReg,
    n_bytes: u8,
) -> Result<Item, ConstructionError> {
    let sz = size::of_bytes(n_bytes).ok_or(ConstructionError::InvalidSize(n_bytes))?;
    let dst = dst.into_reg()?.as_u8();
    let src = src.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::STX | sz | mode::MEM,
        dst,
        src,
        offset,
        0,
    )?))
}

/// `*(size *)(dst + offset) = imm` -- store an immediate to memory.
pub fn st(dst: impl IntoReg, offset: i16, imm: i32, n_bytes: u8) -> Result<Item, ConstructionError> {
    let sz = size::of_bytes(n_bytes).ok_or(ConstructionError::InvalidSize(n_bytes))?;
    let dst = dst.into_reg()?.as_u8();
    Ok(Item::Instr(Instruction::new(
        class::ST | sz | mode::MEM,
        dst,
        0,
        offset,
        imm,
    )?))
}

// ------------------------------------------------------------ Atomics ----

fn atomic(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8, op: u32, fetch: bool) -> Result<Item, ConstructionError> {
    let sz = match n_bytes {
        4 => size::W,
        8 => size::DW,
        other => return Err(ConstructionError::InvalidSize(other)),
    };
    let dst = dst.into_reg()?.as_u8();
    let src = src.into_reg()?.as_u8();
    let imm = if fetch { op | atomic_op::FETCH } else { op } as i32;
    Ok(Item::Instr(Instruction::new(
        class::STX | sz | mode::ATOMIC,
        dst,
        src,
        offset,
        imm,
    )?))
}

pub fn atomic_add(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8, fetch: bool) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::ADD, fetch)
}
pub fn atomic_or(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8, fetch: bool) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::OR, fetch)
}
pub fn atomic_and(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8, fetch: bool) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::AND, fetch)
}
pub fn atomic_xor(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8, fetch: bool) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::XOR, fetch)
}
pub fn atomic_xchg(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::XCHG, false)
}
pub fn atomic_cmpxchg(dst: impl IntoReg, offset: i16, src: impl IntoReg, n_bytes: u8) -> Result<Item, ConstructionError> {
    atomic(dst, offset, src, n_bytes, atomic_op::CMPXCHG, false)
}

// -------------------------------------------------------------- Jumps ----

macro_rules! jmp_builder {
    ($name_imm:ident, $name_reg:ident, $op:expr, $class:expr) => {
        pub fn $name_imm(
            dst: impl IntoReg,
            imm: i32,
            target: impl Into<JumpTarget>,
        ) -> Result<Item, ConstructionError> {
            let dst = dst.into_reg()?.as_u8();
            match jump_item($class | src_mode::K | $op, target) {
                Item::Instr(mut insn) => {
                    insn.set_dst(dst);
                    insn.imm = imm;
                    Ok(Item::Instr(insn))
                }
                Item::PendingJump(mut insn, name) => {
                    insn.set_dst(dst);
                    insn.imm = imm;
                    Ok(Item::PendingJump(insn, name))
                }
                _ => unreachable!(),
            }
        }

        pub fn $name_reg(
            dst: impl IntoReg,
            src: impl IntoReg,
            target: impl Into<JumpTarget>,
        ) -> Result<Item, ConstructionError> {
            let dst = dst.into_reg()?.as_u8();
            let src = src.into_reg()?.as_u8();
            match jump_item($class | src_mode::X | $op, target) {
                Item::Instr(mut insn) => {
                    insn.set_dst(dst);
                    insn.set_src(src);
                    Ok(Item::Instr(insn))
                }
                Item::PendingJump(mut insn, name) => {
                    insn.set_dst(dst);
                    insn.set_src(src);
                    Ok(Item::PendingJump(insn, name))
                }
                _ => unreachable!(),
            }
        }
    };
}

jmp_builder!(jeq, jeq_reg, jmp_op::JEQ, class::JMP);
jmp_builder!(jgt, jgt_reg, jmp_op::JGT, class::JMP);
jmp_builder!(jge, jge_reg, jmp_op::JGE, class::JMP);
jmp_builder!(jset, jset_reg, jmp_op::JSET, class::JMP);
jmp_builder!(jne, jne_reg, jmp_op::JNE, class::JMP);
jmp_builder!(jsgt, jsgt_reg, jmp_op::JSGT, class::JMP);
jmp_builder!(jsge, jsge_reg, jmp_op::JSGE, class::JMP);
jmp_builder!(jlt, jlt_reg, jmp_op::JLT, class::JMP);
jmp_builder!(jle, jle_reg, jmp_op::JLE, class::JMP);
jmp_builder!(jslt, jslt_reg, jmp_op::JSLT, class::JMP);
jmp_builder!(jsle, jsle_reg, jmp_op::JSLE, class::JMP);

jmp_builder!(jeq32, jeq32_reg, jmp_op::JEQ, class::JMP32);
jmp_builder!(jgt32, jgt32_reg, jmp_op::JGT, class::JMP32);
jmp_builder!(jge32, jge32_reg, jmp_op::JGE, class::JMP32);
jmp_builder!(jset32, jset32_reg, jmp_op::JSET, class::JMP32);
jmp_builder!(jne32, jne32_reg, jmp_op::JNE, class::JMP32);
jmp_builder!(jsgt32, jsgt32_reg, jmp_op::JSGT, class::JMP32);
jmp_builder!(jsge32, jsge32_reg, jmp_op::JSGE, class::JMP32);
jmp_builder!(jlt32, jlt32_reg, jmp_op::JLT, class::JMP32);
jmp_builder!(jle32, jle32_reg, jmp_op::JLE, class::JMP32);
jmp_builder!(jslt32, jslt32_reg, jmp_op::JSLT, class::JMP32);
jmp_builder!(jsle32, jsle32_reg, jmp_op::JSLE, class::JMP32);

/// Unconditional jump.
pub fn ja(target: impl Into<JumpTarget>) -> Item {
    jump_item(class::JMP | src_mode::K | jmp_op::JA, target)
}

// --------------------------------------------------------- Call / exit ---

/// Invoke helper `helper_id` with arguments already placed in `r1..=r5`.
pub fn call(helper_id: i32) -> Item {
    Item::Instr(
        Instruction::new(class::JMP | src_mode::K | jmp_op::CALL, 0, 0, 0, helper_id)
            .expect("call operands always valid"),
    )
}

/// `bpf_tail_call` is helper id 12, reached through the ordinary `call`
/// encoding -- a separate constructor documents intent at call sites.
pub fn tail_call() -> Item {
    call(12)
}

/// Return from the program; the verdict must already be in `r0`.
pub fn exit() -> Item {
    Item::Instr(
        Instruction::new(class::JMP | src_mode::K | jmp_op::EXIT, 0, 0, 0, 0)
            .expect("exit operands always valid"),
    )
}

// --------------------------------------------------------------- lddw ----

/// Load a 64-bit immediate into `dst` across two instruction slots: the
/// first carries the low 32 bits, the second carries the high 32 bits
/// and is otherwise zeroed.
pub fn lddw(dst: impl IntoReg, value: u64) -> Result<(Instruction, Instruction), ConstructionError> {
    let dst = dst.into_reg()?.as_u8();
    let lo = Instruction::new(
        class::LD | size::DW | mode::IMM,
        dst,
        0,
        0,
        value as u32 as i32,
    )?;
    let hi = Instruction::new(0, 0, 0, 0, (value >> 32) as u32 as i32)?;
    Ok((lo, hi))
}

/// `lddw` variant whose `src = 1` tells the kernel to substitute a live
/// map file descriptor at load time.
pub fn ld_map_fd(dst: impl IntoReg, fd: i32) -> Result<Item, ConstructionError> {
    let dst_reg = dst.into_reg()?;
    let (mut lo, hi) = lddw(dst_reg, fd as u64)?;
    lo.set_src(pseudo::MAP_FD);
    Ok(Item::Wide(lo, hi))
}

/// `lddw` variant whose `src = 2` tells the kernel to substitute the
/// address of a map's value region at load time.
pub fn ld_map_value(dst: impl IntoReg, fd: i32, value_offset: u32) -> Result<Item, ConstructionError> {
    let dst_reg = dst.into_reg()?;
    let (mut lo, hi) = lddw(dst_reg, fd as u64)?;
    lo.set_src(pseudo::MAP_VALUE);
    let mut hi = hi;
    hi.imm = value_offset as i32;
    Ok(Item::Wide(lo, hi))
}

/// Plain 64-bit immediate load (no pseudo-source).
pub fn ld_imm64(dst: impl IntoReg, value: u64) -> Result<Item, ConstructionError> {
    let (lo, hi) = lddw(dst, value)?;
    Ok(Item::Wide(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::reg::Reg;

    #[test]
    fn lddw_round_trips_a_u64() {
        let v: u64 = 0xDEAD_BEEF_0BAD_F00D;
        let (lo, hi) = lddw(Reg::R1, v).unwrap();
        let reconstructed = ((hi.imm as u32 as u64) << 32) | (lo.imm as u32 as u64);
        assert_eq!(reconstructed, v);
    }

    #[test]
    fn ld_map_fd_matches_literal_scenario_bytes() {
        let item = ld_map_fd(Reg::R1, 7).unwrap();
        let bytes = assemble(vec![item, exit()]).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[1], 0x10); // src=1 (MAP_FD), dst=1
        assert_eq!(&bytes[4..8], &[0x07, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..16], &[0u8; 8]);
    }

    #[test]
    fn mov_then_exit_is_sixteen_bytes() {
        let bytes = assemble(vec![mov(Reg::R0, 1).unwrap(), exit()]).unwrap();
        assert_eq!(bytes.len(), 16);
    }
}
