//! Typed BPF map handles and the kernel syscall bridge (spec.md §4.3,
//! component C4): lifecycle, element ops, lazy iteration, batched ops,
//! per-CPU lanes, map-in-map, and the specialized map kinds, all built
//! on one [`BpfSyscall`] trait so the suite never needs a live kernel.

mod batch;
mod error;
mod fake;
mod handle;
mod iter;
mod kind;
mod mapinmap;
mod percpu;
mod scoped;
mod specialized;
mod syscall;

pub use error::KernelError;
pub use fake::FakeBpfSyscall;
pub use handle::{MapHandle, MapMetadata};
pub use iter::{Keys, Pairs, Values};
pub use kind::MapKind;
pub use mapinmap::MapInMap;
pub use percpu::{avg_u64, max_u64, min_u64, num_possible_cpus, sum_u64};
pub use scoped::{with_map, with_map_in_map};
pub use syscall::{BpfSyscall, MapCreateSpec, UpdatePolicy};

#[cfg(target_os = "linux")]
pub use syscall::LinuxBpfSyscall;
