//! Unified entry point (spec.md §4.8, component C12) combining the
//! instruction encoder, map runtime, probe resolvers, and attach-type
//! DSLs into one crate, so a caller writing a whole BPF program doesn't
//! need to track which sub-crate a given builder lives in.
//!
//! ```ignore
//! use bpfsmith::prelude::*;
//!
//! let body = vec![ops::mov(Reg::R0, xdp::XdpAction::Pass.as_i32())?, ops::exit()];
//! let bytes = program("xdp", body)?;
//! ```

pub use bpfsmith_core::{assemble, program, AssemblyError, ConstructionError, EventDescriptor, FieldSpec, FieldType, FieldValue, Helper, Instruction, IntoReg, Item, JumpTarget, LabelName, Reg};
pub use bpfsmith_core::ops;

pub use bpfsmith_maps::{
    avg_u64, max_u64, min_u64, num_possible_cpus, sum_u64, with_map, with_map_in_map, BpfSyscall,
    FakeBpfSyscall, KernelError, Keys, MapCreateSpec, MapHandle, MapInMap, MapKind, MapMetadata,
    Pairs, UpdatePolicy, Values,
};
#[cfg(target_os = "linux")]
pub use bpfsmith_maps::LinuxBpfSyscall;

pub use bpfsmith_probes::{
    find_library, kprobe_section, kretprobe_section, pt_regs_arg_offset, pt_regs_rc_offset,
    raw_tracepoint_section, resolve_symbol, tracefs_mount, tracepoint_section, uprobe_section,
    uretprobe_section, Arch, ElfError, ElfFile, ProbeContext, TracefsError, TracepointCache,
    TracepointDescriptor, TracepointField,
};

pub use bpfsmith_net::verdict_keyword;
pub use bpfsmith_net::{common, fentry, flow_dissector, perf_iter, socket, struct_ops, tc, xdp};

/// Brings every builder and type most programs need into scope with one
/// `use bpfsmith::prelude::*;`, mirroring what a hand-assembled program
/// typically touches: the instruction builders, register/jump types,
/// and the attach-type DSL modules.
pub mod prelude {
    pub use crate::ops;
    pub use crate::{assemble, program, ConstructionError, IntoReg, Item, JumpTarget, Reg};
    pub use crate::{common, fentry, flow_dissector, perf_iter, socket, struct_ops, tc, xdp};
    pub use crate::verdict_keyword;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_wrapper_is_reexported_and_matches_assemble() {
        let body = vec![ops::mov(Reg::R0, xdp::XdpAction::Pass.as_i32()).unwrap(), ops::exit()];
        let a = program("xdp", body.clone()).unwrap();
        let b = assemble(body).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn verdict_keyword_reexport_works() {
        assert_eq!(verdict_keyword("xdp", "pass"), Some(2));
    }
}
