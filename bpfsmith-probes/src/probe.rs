//! kprobe/uprobe/tracepoint/raw-tracepoint DSL: pt_regs argument access
//! and canonical section-name builders (spec.md §4.5).

use bpfsmith_core::{ConstructionError, Item, Reg};

/// Host CPU architecture tags the pt_regs table is keyed by.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Arm64,
    S390x,
    Ppc64le,
    Riscv64,
}

/// Architecture-dependent pt_regs argument offsets, spec.md §4.5.
/// Index 0 corresponds to the first argument (`arg0`).
pub fn pt_regs_arg_offset(arch: Arch, arg_index: u8) -> Option<u32> {
    let table: &[u32] = match arch {
        // di, si, dx, cx, r8 (x86-64 syscall/C ABI argument registers)
        Arch::X86_64 => &[112, 104, 96, 48, 72],
        // x0..x4
        Arch::Arm64 => &[0, 8, 16, 24, 32],
        // gprs[2..=6]
        Arch::S390x => &[16, 24, 32, 40, 48],
        // gpr[3..=7]
        Arch::Ppc64le => &[24, 32, 40, 48, 56],
        // a0..a4
        Arch::Riscv64 => &[80, 88, 96, 104, 112],
    };
    table.get(arg_index as usize).copied()
}

/// The return-value offset (`PT_REGS_RC`), architecture-dependent
/// (spec.md §4.5).
pub fn pt_regs_rc_offset(arch: Arch) -> u32 {
    match arch {
        Arch::X86_64 => 80,
        Arch::Arm64 => 0,
        Arch::S390x => 16,
        Arch::Ppc64le => 24,
        Arch::Riscv64 => 80,
    }
}

/// `"kprobe/<func>"`.
pub fn kprobe_section(func: &str) -> String {
    format!("kprobe/{func}")
}

/// `"kretprobe/<func>"`.
pub fn kretprobe_section(func: &str) -> String {
    format!("kretprobe/{func}")
}

/// `"uprobe/<libname>:<symbol>"`.
pub fn uprobe_section(libname: &str, symbol: &str) -> String {
    format!("uprobe/{libname}:{symbol}")
}

pub fn uretprobe_section(libname: &str, symbol: &str) -> String {
    format!("uretprobe/{libname}:{symbol}")
}

/// `"tracepoint/<cat>/<name>"`.
pub fn tracepoint_section(category: &str, name: &str) -> String {
    format!("tracepoint/{category}/{name}")
}

/// `"raw_tracepoint/<name>"`.
pub fn raw_tracepoint_section(name: &str) -> String {
    format!("raw_tracepoint/{name}")
}

/// A kprobe/uprobe program body: `ctx_reg` holds the `pt_regs *`
/// delivered in `r1`; `.arg(n)` and `.return_value()` load from it at
/// the architecture's pt_regs offsets.
pub struct ProbeContext {
    arch: Arch,
    ctx_reg: Reg,
}

impl ProbeContext {
    pub fn new(arch: Arch, ctx_reg: impl bpfsmith_core::IntoReg) -> Result<Self, ConstructionError> {
        Ok(Self { arch, ctx_reg: ctx_reg.into_reg()? })
    }

    /// Loads argument `index` into `dst` (an 8-byte read off `pt_regs`).
    pub fn load_arg(&self, dst: impl bpfsmith_core::IntoReg, index: u8) -> Result<Item, ConstructionError> {
        let offset = pt_regs_arg_offset(self.arch, index)
            .ok_or(ConstructionError::OffsetOutOfRange(index as i64))?;
        bpfsmith_core::ops::ldx(dst, self.ctx_reg, offset as i16, 8)
    }

    /// Loads the probed function's return value (kretprobe/uretprobe
    /// context only).
    pub fn load_return_value(&self, dst: impl bpfsmith_core::IntoReg) -> Result<Item, ConstructionError> {
        let offset = pt_regs_rc_offset(self.arch);
        bpfsmith_core::ops::ldx(dst, self.ctx_reg, offset as i16, 8)
    }
}
