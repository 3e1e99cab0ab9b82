//! Map-in-map support (spec.md §4.3 "Map-in-map"): an outer map whose
//! values are FDs of inner maps conforming to a single template.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::KernelError;
use crate::handle::MapHandle;
use crate::syscall::{BpfSyscall, MapCreateSpec, UpdatePolicy};

/// Owns the outer map, the inner-map template's creation spec, and a
/// mapping from outer key to the currently bound inner map handle so
/// `remove_inner` can close the right FD.
pub struct MapInMap<S: BpfSyscall> {
    outer: MapHandle<S>,
    syscall: S,
    template: MapCreateSpec,
    bound: Mutex<HashMap<Vec<u8>, MapHandle<S>>>,
}

impl<S: BpfSyscall + Clone> MapInMap<S> {
    /// Creates the template inner map, then the outer map referencing it
    /// (the kernel needs the template FD for type-checking the
    /// `array_of_maps`/`hash_of_maps` outer map).
    pub fn create(
        syscall: S,
        mut outer_spec: MapCreateSpec,
        template: MapCreateSpec,
    ) -> Result<Self, KernelError> {
        let template_handle = MapHandle::create(syscall.clone(), template.clone())?;
        outer_spec.inner_map_fd = Some(template_handle.fd());
        let outer = MapHandle::create(syscall.clone(), outer_spec)?;
        drop(template_handle);
        Ok(Self { outer, syscall, template, bound: Mutex::new(HashMap::new()) })
    }

    pub fn outer(&self) -> &MapHandle<S> {
        &self.outer
    }

    /// Creates a fresh inner map from the template and installs its FD
    /// at `key`, replacing anything already bound there.
    pub fn add_inner(&self, key: &[u8]) -> Result<MapHandle<S>, KernelError> {
        let inner = MapHandle::create(self.syscall.clone(), self.template.clone())?;
        let fd = inner.fd();
        self.outer.update(key, &fd.to_ne_bytes(), UpdatePolicy::Any)?;
        self.bound.lock().unwrap().insert(key.to_vec(), inner.clone());
        Ok(inner)
    }

    /// Deletes the outer entry at `key` and closes the bound inner map.
    pub fn remove_inner(&self, key: &[u8]) -> Result<bool, KernelError> {
        let present = self.outer.delete(key)?;
        self.bound.lock().unwrap().remove(key);
        Ok(present)
    }

    fn inner_for(&self, outer_key: &[u8]) -> Option<MapHandle<S>> {
        self.bound.lock().unwrap().get(outer_key).cloned()
    }

    pub fn inner_lookup(&self, outer_key: &[u8], inner_key: &[u8]) -> Result<Option<Vec<u8>>, KernelError> {
        match self.inner_for(outer_key) {
            Some(inner) => inner.lookup(inner_key),
            None => Ok(None),
        }
    }

    /// Creates the inner map lazily if `outer_key` has no binding yet.
    pub fn inner_update(
        &self,
        outer_key: &[u8],
        inner_key: &[u8],
        value: &[u8],
        policy: UpdatePolicy,
    ) -> Result<(), KernelError> {
        let inner = match self.inner_for(outer_key) {
            Some(inner) => inner,
            None => self.add_inner(outer_key)?,
        };
        inner.update(inner_key, value, policy)
    }

    /// Closes every bound inner map, then the outer map (spec.md §4.3
    /// resource-acquisition note).
    pub fn close_all(self) -> Result<(), KernelError> {
        self.bound.lock().unwrap().clear();
        drop(self.outer);
        Ok(())
    }
}
