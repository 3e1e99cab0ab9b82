//! Batched map operations (spec.md §4.3 "Batched operations"): pack keys
//! and values into two contiguous arrays, issue one kernel call, and fall
//! back to the per-element form when the kernel rejects the batch with
//! EINVAL (older kernels without batch support).

use crate::error::KernelError;
use crate::handle::{libc_enoent, MapHandle};
use crate::syscall::{BpfSyscall, UpdatePolicy};

const EINVAL: i32 = 22;

impl<S: BpfSyscall> MapHandle<S> {
    pub fn lookup_batch(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, KernelError> {
        let key_size = self.key_size() as usize;
        let value_size = self.value_size() as usize;
        let count = keys.len() as u32;
        let mut packed_keys = vec![0u8; key_size * keys.len()];
        for (i, k) in keys.iter().enumerate() {
            packed_keys[i * key_size..(i + 1) * key_size].copy_from_slice(k);
        }
        let mut packed_values = vec![0u8; value_size * keys.len()];
        match self.syscall().map_lookup_batch(self.fd(), &mut packed_keys, &mut packed_values, count) {
            Ok(_) => Ok(keys
                .iter()
                .enumerate()
                .map(|(i, _)| Some(packed_values[i * value_size..(i + 1) * value_size].to_vec()))
                .collect()),
            Err(e) if e.errno == EINVAL || e.errno == libc_enoent() => {
                keys.iter().map(|k| self.lookup(k)).collect()
            }
            Err(e) => Err(e),
        }
    }

    pub fn update_batch(
        &self,
        pairs: &[(Vec<u8>, Vec<u8>)],
        policy: UpdatePolicy,
    ) -> Result<u32, KernelError> {
        let key_size = self.key_size() as usize;
        let value_size = self.value_size() as usize;
        let mut keys = vec![0u8; key_size * pairs.len()];
        let mut values = vec![0u8; value_size * pairs.len()];
        for (i, (k, v)) in pairs.iter().enumerate() {
            keys[i * key_size..(i + 1) * key_size].copy_from_slice(k);
            values[i * value_size..(i + 1) * value_size].copy_from_slice(v);
        }
        match self.syscall().map_update_batch(self.fd(), &keys, &values, pairs.len() as u32, policy) {
            Ok(n) => Ok(n),
            Err(e) if e.errno == EINVAL => {
                for (k, v) in pairs {
                    self.update(k, v, policy)?;
                }
                Ok(pairs.len() as u32)
            }
            Err(e) => Err(e),
        }
    }

    pub fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<u32, KernelError> {
        let key_size = self.key_size() as usize;
        let mut packed = vec![0u8; key_size * keys.len()];
        for (i, k) in keys.iter().enumerate() {
            packed[i * key_size..(i + 1) * key_size].copy_from_slice(k);
        }
        match self.syscall().map_delete_batch(self.fd(), &packed, keys.len() as u32) {
            Ok(n) => Ok(n),
            Err(e) if e.errno == EINVAL => {
                let mut n = 0;
                for k in keys {
                    if self.delete(k)? {
                        n += 1;
                    }
                }
                Ok(n)
            }
            Err(e) => Err(e),
        }
    }

    pub fn lookup_and_delete_batch(
        &self,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Option<Vec<u8>>>, KernelError> {
        let key_size = self.key_size() as usize;
        let value_size = self.value_size() as usize;
        let mut packed_keys = vec![0u8; key_size * keys.len()];
        for (i, k) in keys.iter().enumerate() {
            packed_keys[i * key_size..(i + 1) * key_size].copy_from_slice(k);
        }
        let mut packed_values = vec![0u8; value_size * keys.len()];
        match self.syscall().map_lookup_and_delete_batch(
            self.fd(),
            &mut packed_keys,
            &mut packed_values,
            keys.len() as u32,
        ) {
            Ok(_) => Ok(keys
                .iter()
                .enumerate()
                .map(|(i, _)| Some(packed_values[i * value_size..(i + 1) * value_size].to_vec()))
                .collect()),
            Err(e) if e.errno == EINVAL => keys
                .iter()
                .map(|k| {
                    let v = self.lookup(k)?;
                    if v.is_some() {
                        self.delete(k)?;
                    }
                    Ok(v)
                })
                .collect(),
            Err(e) if e.errno == libc_enoent() => Ok(vec![None; keys.len()]),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBpfSyscall;
    use crate::kind::MapKind;
    use crate::syscall::MapCreateSpec;

    fn handle() -> MapHandle<FakeBpfSyscall> {
        MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::Hash, 4, 4, 16)).unwrap()
    }

    #[test]
    fn update_batch_then_lookup_batch_round_trips() {
        let h = handle();
        let pairs: Vec<_> = (0..4i32).map(|i| (i.to_le_bytes().to_vec(), (i * 3).to_le_bytes().to_vec())).collect();
        h.update_batch(&pairs, UpdatePolicy::Any).unwrap();
        let keys: Vec<_> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let values = h.lookup_batch(&keys).unwrap();
        for (i, v) in values.into_iter().enumerate() {
            assert_eq!(i32::from_le_bytes(v.unwrap().try_into().unwrap()), i as i32 * 3);
        }
    }

    #[test]
    fn lookup_batch_matches_individual_lookups_for_out_of_order_keys_and_extra_entries() {
        let h = handle();
        // Populate more entries than we'll request, and in an order whose
        // little-endian byte encoding does not sort ascending, so a dump-style
        // implementation iterating `entries` in key order would mismatch.
        for i in [10i32, 3, 7, 1, 256, 42] {
            h.update(&i.to_le_bytes(), &(i * 3).to_le_bytes(), UpdatePolicy::Any).unwrap();
        }
        let requested = [256i32, 1, 42];
        let keys: Vec<_> = requested.iter().map(|i| i.to_le_bytes().to_vec()).collect();
        let values = h.lookup_batch(&keys).unwrap();
        for (i, v) in requested.iter().zip(values) {
            assert_eq!(i32::from_le_bytes(v.unwrap().try_into().unwrap()), i * 3);
        }
    }

    #[test]
    fn einval_falls_back_to_per_element_and_preserves_semantics() {
        let h = handle();
        h.syscall().force_einval_once("map_update_batch");
        let pairs = vec![(1i32.to_le_bytes().to_vec(), 2i32.to_le_bytes().to_vec())];
        h.update_batch(&pairs, UpdatePolicy::Any).unwrap();
        assert_eq!(h.lookup(&1i32.to_le_bytes()).unwrap(), Some(2i32.to_le_bytes().to_vec()));
    }

    #[test]
    fn delete_batch_reports_actual_count_deleted() {
        let h = handle();
        h.update(&1i32.to_le_bytes(), &1i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let n = h
            .delete_batch(&[1i32.to_le_bytes().to_vec(), 2i32.to_le_bytes().to_vec()])
            .unwrap();
        assert_eq!(n, 1);
    }
}
