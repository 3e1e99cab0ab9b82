//! Scoped-acquisition helpers (spec.md §4.3 "Resource acquisition"):
//! guarantee a map, or a map-in-map's full inner set, is released even
//! if the closure returns early via `?`.

use crate::error::KernelError;
use crate::handle::MapHandle;
use crate::mapinmap::MapInMap;
use crate::syscall::{BpfSyscall, MapCreateSpec};

/// Creates a map, runs `f` with it, and closes it on every exit path.
pub fn with_map<S, T>(
    syscall: S,
    spec: MapCreateSpec,
    f: impl FnOnce(&MapHandle<S>) -> Result<T, KernelError>,
) -> Result<T, KernelError>
where
    S: BpfSyscall,
{
    let handle = MapHandle::create(syscall, spec)?;
    f(&handle)
}

/// Creates a map-in-map, runs `f` with it, and closes every inner map
/// then the outer map on every exit path.
pub fn with_map_in_map<S, T>(
    syscall: S,
    outer_spec: MapCreateSpec,
    template: MapCreateSpec,
    f: impl FnOnce(&MapInMap<S>) -> Result<T, KernelError>,
) -> Result<T, KernelError>
where
    S: BpfSyscall + Clone,
{
    let mim = MapInMap::create(syscall, outer_spec, template)?;
    let result = f(&mim);
    mim.close_all()?;
    result
}
