//! fentry/fexit/LSM DSL (spec.md §4.5): BTF-typed tracing programs whose
//! arguments arrive directly in `r1..=r5` rather than through a context
//! struct, plus the LSM hook verdict convention.

use bpfsmith_core::{ConstructionError, Item, Reg};

use crate::common;

/// Kernel attach-type ids for `BPF_PROG_TYPE_TRACING` programs (spec.md
/// §4.5), matching `include/uapi/linux/bpf.h`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum TracingAttachType {
    FEntry = 24,
    FExit = 25,
    ModifyReturn = 26,
}

impl TracingAttachType {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// External collaborator: resolves BTF type information for the
/// function a fentry/fexit/LSM program attaches to. Kept as a trait
/// so callers can plug in a real BTF reader without this crate linking
/// one (spec.md §9, struct_ops/BTF open question).
pub trait BtfResolver {
    /// Looks up a function's BTF id by name, if present.
    fn find_function(&self, name: &str) -> Option<u32>;
    /// Returns `(return_type_name, arg_type_names)` for a resolved
    /// function BTF id.
    fn get_function_signature(&self, btf_id: u32) -> Option<(String, Vec<String>)>;
    /// Resolves a dotted field-access path (e.g. `"task.pid"`) against
    /// a named struct into a byte offset and size.
    fn field_path_to_access_info(&self, struct_name: &str, path: &str) -> Option<(u16, u8)>;
}

pub fn fentry_section(func_name: &str) -> String {
    format!("fentry/{func_name}")
}

pub fn fexit_section(func_name: &str) -> String {
    format!("fexit/{func_name}")
}

pub fn lsm_section(hook_name: &str) -> String {
    format!("lsm/{hook_name}")
}

/// LSM hook verdicts: zero allows, a negative errno denies (spec.md
/// §4.5). These are the common ones an LSM hook returns.
pub mod lsm_verdict {
    pub const ALLOW: i32 = 0;
    pub const EPERM: i32 = -1;
    pub const ENOENT: i32 = -2;
    pub const EACCES: i32 = -13;
    pub const EINVAL: i32 = -22;
}

/// Reads argument `index` (0-based) directly out of `r1..=r5` — fentry
/// and LSM programs receive the traced function's own arguments this
/// way rather than through a context struct.
pub fn load_arg(index: u8) -> Result<Reg, ConstructionError> {
    match index {
        0 => Ok(Reg::R1),
        1 => Ok(Reg::R2),
        2 => Ok(Reg::R3),
        3 => Ok(Reg::R4),
        4 => Ok(Reg::R5),
        _ => Err(ConstructionError::InvalidRegister(index)),
    }
}

/// fexit programs receive the traced function's return value as the
/// last argument after all its parameters; `arg_count` is the number
/// of arguments the traced function itself takes.
pub fn load_return_value(arg_count: u8) -> Result<Reg, ConstructionError> {
    load_arg(arg_count)
}

/// Wraps `body` with an epilogue returning `verdict` in `r0` (allow/deny
/// for LSM, or an ignored value for fentry/fexit where the return value
/// has no verifier-visible effect).
pub fn build(body: Vec<Item>, verdict: i32) -> Result<Vec<Item>, ConstructionError> {
    let mut items = body;
    items.extend(common::epilogue(verdict)?);
    Ok(items)
}
