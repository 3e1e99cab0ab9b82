//! ELF symbol resolution (component C13) and tracefs format parsing
//! (component C9): the two external-resource readers the kprobe/uprobe/
//! tracepoint DSL needs to translate a human-given name into the bytes
//! and offsets the kernel attach path expects.

pub mod elf;
pub mod probe;
pub mod tracefs;

pub use elf::{find_library, resolve_symbol, ElfError, ElfFile};
pub use probe::{
    kprobe_section, kretprobe_section, pt_regs_arg_offset, pt_regs_rc_offset, raw_tracepoint_section,
    tracepoint_section, uprobe_section, uretprobe_section, Arch, ProbeContext,
};
pub use tracefs::{tracefs_mount, TracefsError, TracepointCache, TracepointDescriptor, TracepointField};
