//! Instruction model, opcode builders, and two-pass label assembler for
//! hand-built BPF programs (spec.md components C1-C3, C5, C11).
//!
//! This crate produces exactly the 64-bit-per-instruction byte stream the
//! Linux kernel's `bpf(2)` program-load path expects. It does not talk to
//! the kernel itself -- see `bpfsmith-maps` for the map runtime and
//! `bpfsmith-net`/`bpfsmith-probes` for the per-attach-type DSLs that sit
//! on top of this crate.

pub mod assembler;
pub mod error;
pub mod event;
pub mod helpers;
pub mod insn;
pub mod ops;
pub mod reg;

pub use assembler::{assemble, Item, LabelName};
pub use error::{AssemblyError, ConstructionError};
pub use event::{EventDescriptor, FieldSpec, FieldType, FieldValue};
pub use helpers::Helper;
pub use insn::Instruction;
pub use ops::JumpTarget;
pub use reg::{IntoReg, Reg};

/// Assemble a named program from a body of items. Equivalent to
/// `assemble(vec![body...])`; the `kind` argument exists purely to read
/// naturally at call sites (`program("xdp", ...)`) and carries no
/// behavior of its own -- section naming is the attach-type DSLs'
/// responsibility (spec.md §4.5).
pub fn program(_kind: &str, body: Vec<Item>) -> Result<Vec<u8>, AssemblyError> {
    assemble(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_wrapper_matches_assemble() {
        let a = program("xdp", vec![ops::mov(Reg::R0, 1).unwrap(), ops::exit()]).unwrap();
        let b = assemble(vec![ops::mov(Reg::R0, 1).unwrap(), ops::exit()]).unwrap();
        assert_eq!(a, b);
    }
}
