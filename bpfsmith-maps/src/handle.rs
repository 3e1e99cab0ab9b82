//! The owned map handle (spec.md §4.3's "Lifecycle operations") and its
//! element-level operations. A handle is a thin wrapper over a kernel FD;
//! sharing is by `Arc` clone, with `close` firing only when the last
//! reference is dropped.

use std::sync::Arc;

use crate::error::KernelError;
use crate::kind::MapKind;
use crate::syscall::{BpfSyscall, MapCreateSpec, UpdatePolicy};

struct Inner<S: BpfSyscall> {
    fd: i32,
    syscall: S,
}

impl<S: BpfSyscall> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Err(e) = self.syscall.close(self.fd) {
            log::debug!("closing map fd {}: {e}", self.fd);
        }
    }
}

/// Metadata the kernel does not report back for an existing FD, required
/// by [`MapHandle::from_existing_fd`] and [`MapHandle::open_pinned`].
#[derive(Clone, Debug)]
pub struct MapMetadata {
    pub kind: MapKind,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub per_cpu_size: Option<usize>,
}

/// An owned, reference-counted handle to a kernel BPF map.
///
/// Generic over the syscall bridge so tests can substitute
/// [`crate::fake::FakeBpfSyscall`] for [`crate::syscall::LinuxBpfSyscall`].
#[derive(Clone)]
pub struct MapHandle<S: BpfSyscall> {
    inner: Arc<Inner<S>>,
    pub(crate) kind: MapKind,
    pub(crate) key_size: u32,
    pub(crate) value_size: u32,
    pub(crate) max_entries: u32,
    pub(crate) name: Option<String>,
    /// `Some(per_cpu_slot_size)` for per-CPU maps; normalizes the
    /// source's inconsistent `percpu?` flag into one explicit field
    /// present on every handle (spec.md §9).
    pub(crate) per_cpu_size: Option<usize>,
}

impl<S: BpfSyscall> MapHandle<S> {
    pub fn create(syscall: S, spec: MapCreateSpec) -> Result<Self, KernelError> {
        let per_cpu_size = if spec.kind.is_per_cpu() {
            Some(spec.value_size as usize)
        } else {
            None
        };
        let kind = spec.kind;
        let key_size = spec.key_size;
        let value_size = spec.value_size;
        let max_entries = spec.max_entries;
        let name = spec.name.clone();
        let fd = syscall.map_create(&spec)?;
        Ok(Self {
            inner: Arc::new(Inner { fd, syscall }),
            kind,
            key_size,
            value_size,
            max_entries,
            name,
            per_cpu_size,
        })
    }

    pub fn from_existing_fd(syscall: S, fd: i32, metadata: MapMetadata) -> Self {
        Self {
            inner: Arc::new(Inner { fd, syscall }),
            kind: metadata.kind,
            key_size: metadata.key_size,
            value_size: metadata.value_size,
            max_entries: metadata.max_entries,
            name: None,
            per_cpu_size: metadata.per_cpu_size,
        }
    }

    pub fn pin(&self, path: &str) -> Result<(), KernelError> {
        self.inner.syscall.obj_pin(path, self.inner.fd)
    }

    pub fn open_pinned(syscall: S, path: &str, metadata: MapMetadata) -> Result<Self, KernelError> {
        let fd = syscall.obj_get(path)?;
        Ok(Self::from_existing_fd(syscall, fd, metadata))
    }

    pub fn fd(&self) -> i32 {
        self.inner.fd
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn value_size(&self) -> u32 {
        self.value_size
    }

    pub fn max_entries(&self) -> u32 {
        self.max_entries
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn per_cpu_size(&self) -> Option<usize> {
        self.per_cpu_size
    }

    pub(crate) fn syscall(&self) -> &S {
        &self.inner.syscall
    }

    fn value_len(&self) -> usize {
        self.per_cpu_size.map(|_| self.value_size as usize).unwrap_or(self.value_size as usize)
    }

    /// `lookup(k) -> Option<v>` with ENOENT remapped to `None`
    /// (spec.md §4.3 "Error mapping").
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KernelError> {
        let mut value = vec![0u8; self.value_len()];
        match self.inner.syscall.map_lookup_elem(self.inner.fd, key, &mut value) {
            Ok(()) => Ok(Some(value)),
            Err(e) if e.errno == libc_enoent() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn update(&self, key: &[u8], value: &[u8], policy: UpdatePolicy) -> Result<(), KernelError> {
        self.inner.syscall.map_update_elem(self.inner.fd, key, value, policy)
    }

    /// `delete(k) -> bool`, true iff the key was present.
    pub fn delete(&self, key: &[u8]) -> Result<bool, KernelError> {
        match self.inner.syscall.map_delete_elem(self.inner.fd, key) {
            Ok(()) => Ok(true),
            Err(e) if e.errno == libc_enoent() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `next_key(k) -> Option<k>`; `None` seed returns the first key,
    /// exhaustion also yields `None`.
    pub fn next_key(&self, key: Option<&[u8]>) -> Result<Option<Vec<u8>>, KernelError> {
        let mut next = vec![0u8; self.key_size as usize];
        match self.inner.syscall.map_get_next_key(self.inner.fd, key, &mut next) {
            Ok(()) => Ok(Some(next)),
            Err(e) if e.errno == libc_enoent() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn clear(&self) -> Result<(), KernelError> {
        while let Some(k) = self.next_key(None)? {
            self.delete(&k)?;
        }
        Ok(())
    }
}

pub(crate) fn libc_enoent() -> i32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBpfSyscall;

    fn hash_handle() -> MapHandle<FakeBpfSyscall> {
        MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::Hash, 4, 4, 8)).unwrap()
    }

    #[test]
    fn round_trips_update_lookup_delete() {
        let h = hash_handle();
        h.update(&1i32.to_le_bytes(), &9i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let v = h.lookup(&1i32.to_le_bytes()).unwrap();
        assert_eq!(v.map(|b| i32::from_le_bytes(b.try_into().unwrap())), Some(9));
        assert!(h.delete(&1i32.to_le_bytes()).unwrap());
        assert_eq!(h.lookup(&1i32.to_le_bytes()).unwrap(), None);
    }

    #[test]
    fn missing_key_lookup_is_none_not_error() {
        let h = hash_handle();
        assert_eq!(h.lookup(&42i32.to_le_bytes()).unwrap(), None);
        assert!(!h.delete(&42i32.to_le_bytes()).unwrap());
    }

    #[test]
    fn next_key_enumerates_every_key_exactly_once() {
        let h = hash_handle();
        for i in 0..4i32 {
            h.update(&i.to_le_bytes(), &(i * 10).to_le_bytes(), UpdatePolicy::Any).unwrap();
        }
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            match h.next_key(cursor.as_deref()).unwrap() {
                Some(k) => {
                    seen.push(k.clone());
                    cursor = Some(k);
                }
                None => break,
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn clear_removes_all_entries() {
        let h = hash_handle();
        for i in 0..3i32 {
            h.update(&i.to_le_bytes(), &i.to_le_bytes(), UpdatePolicy::Any).unwrap();
        }
        h.clear().unwrap();
        assert_eq!(h.next_key(None).unwrap(), None);
    }

    #[test]
    fn sharing_by_clone_keeps_the_map_open_until_last_drop() {
        let h = hash_handle();
        let h2 = h.clone();
        drop(h);
        h2.update(&1i32.to_le_bytes(), &1i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        assert!(h2.lookup(&1i32.to_le_bytes()).unwrap().is_some());
    }
}
