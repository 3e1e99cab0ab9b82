//! An in-memory [`BpfSyscall`] used by this crate's own tests and
//! exposed for downstream consumers who want to exercise map-runtime
//! logic without a live kernel (spec.md's suspension-point model makes
//! every real op a blocking syscall, which CI sandboxes cannot issue).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::error::KernelError;
use crate::kind::MapKind;
use crate::syscall::{BpfSyscall, MapCreateSpec, UpdatePolicy};

struct FakeMap {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    key_size: u32,
    max_entries: u32,
    kind: MapKind,
    /// Values pushed through the NULL-key stack/queue convention
    /// (spec.md §4.3). Stack and queue maps never touch `entries`.
    value_queue: Vec<Vec<u8>>,
    /// Insertion order of keys in `entries`, for a stable `next_key`
    /// cursor independent of `BTreeMap`'s byte ordering.
    push_order: Vec<Vec<u8>>,
}

impl FakeMap {
    fn is_stack_or_queue(&self) -> bool {
        matches!(self.kind, MapKind::Stack | MapKind::Queue)
    }

    /// Longest-prefix-match lookup for `MapKind::LpmTrie`. Stored keys
    /// are `{prefixlen: u32 LE, data}`; the kernel's own trie ignores
    /// the query key's `prefixlen` field and searches on the full data
    /// length, returning the entry with the longest matching prefix.
    fn lpm_longest_match(&self, query: &[u8]) -> Option<&Vec<u8>> {
        let query_data = &query[4..];
        self.entries
            .iter()
            .filter_map(|(k, v)| {
                let prefix_len = u32::from_le_bytes(k[0..4].try_into().ok()?);
                let data = &k[4..];
                lpm_bits_match(data, query_data, prefix_len).then_some((prefix_len, v))
            })
            .max_by_key(|(prefix_len, _)| *prefix_len)
            .map(|(_, v)| v)
    }
}

/// Whether the first `bits` bits of `a` and `b` are equal.
fn lpm_bits_match(a: &[u8], b: &[u8], bits: u32) -> bool {
    let full_bytes = (bits / 8) as usize;
    if a.len() < full_bytes || b.len() < full_bytes {
        return false;
    }
    if a[..full_bytes] != b[..full_bytes] {
        return false;
    }
    let remaining = bits % 8;
    if remaining == 0 {
        return true;
    }
    let mask = 0xFFu8 << (8 - remaining);
    match (a.get(full_bytes), b.get(full_bytes)) {
        (Some(x), Some(y)) => (x & mask) == (y & mask),
        _ => false,
    }
}

#[derive(Default)]
pub struct FakeState {
    maps: Mutex<BTreeMap<i32, FakeMap>>,
    pins: Mutex<BTreeMap<String, i32>>,
    next_fd: Mutex<i32>,
    /// When set, the next batch call of this name fails with EINVAL,
    /// exercising the fallback-to-per-element path.
    force_einval_on: Mutex<Option<&'static str>>,
}

/// In-memory stand-in for the kernel's map state. Cheaply [`Clone`] --
/// clones share the same underlying state via `Arc`, the way a real FD
/// is shared across `dup`'d handles to the same kernel map table.
#[derive(Clone, Default)]
pub struct FakeBpfSyscall {
    state: Arc<FakeState>,
}

impl std::ops::Deref for FakeBpfSyscall {
    type Target = FakeState;
    fn deref(&self) -> &FakeState {
        &self.state
    }
}

impl FakeBpfSyscall {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeState {
                maps: Mutex::new(BTreeMap::new()),
                pins: Mutex::new(BTreeMap::new()),
                next_fd: Mutex::new(3),
                force_einval_on: Mutex::new(None),
            }),
        }
    }

    pub fn force_einval_once(&self, op: &'static str) {
        *self.force_einval_on.lock().unwrap() = Some(op);
    }

    fn maybe_einval(&self, op: &'static str) -> Option<KernelError> {
        let mut guard = self.force_einval_on.lock().unwrap();
        if *guard == Some(op) {
            *guard = None;
            Some(KernelError::new(op, libc_like_einval()))
        } else {
            None
        }
    }

    fn alloc_fd(&self) -> i32 {
        let mut guard = self.next_fd.lock().unwrap();
        let fd = *guard;
        *guard += 1;
        fd
    }
}

fn libc_like_einval() -> i32 {
    22 // EINVAL on Linux
}

fn enoent() -> i32 {
    2
}

impl BpfSyscall for FakeBpfSyscall {
    fn map_create(&self, spec: &MapCreateSpec) -> Result<i32, KernelError> {
        let fd = self.alloc_fd();
        self.maps.lock().unwrap().insert(
            fd,
            FakeMap {
                entries: BTreeMap::new(),
                key_size: spec.key_size,
                max_entries: spec.max_entries,
                kind: spec.kind,
                value_queue: Vec::new(),
                push_order: Vec::new(),
            },
        );
        Ok(fd)
    }

    fn map_lookup_elem(&self, fd: i32, key: &[u8], value: &mut [u8]) -> Result<(), KernelError> {
        let maps = self.maps.lock().unwrap();
        let map = maps.get(&fd).ok_or_else(|| KernelError::new("map_lookup_elem", 9))?;
        if map.is_stack_or_queue() {
            // peek(): NULL-key lookup without removal.
            return match map.value_queue.last() {
                Some(v) => {
                    value[..v.len()].copy_from_slice(v);
                    Ok(())
                }
                None => Err(KernelError::new("map_lookup_elem", enoent())),
            };
        }
        if matches!(map.kind, MapKind::LpmTrie) {
            return match map.lpm_longest_match(key) {
                Some(v) => {
                    value[..v.len()].copy_from_slice(v);
                    Ok(())
                }
                None => Err(KernelError::new("map_lookup_elem", enoent())),
            };
        }
        match map.entries.get(key) {
            Some(v) => {
                value[..v.len()].copy_from_slice(v);
                Ok(())
            }
            None => Err(KernelError::new("map_lookup_elem", enoent())),
        }
    }

    fn map_update_elem(
        &self,
        fd: i32,
        key: &[u8],
        value: &[u8],
        policy: UpdatePolicy,
    ) -> Result<(), KernelError> {
        let mut maps = self.maps.lock().unwrap();
        let map = maps.get_mut(&fd).ok_or_else(|| KernelError::new("map_update_elem", 9))?;
        if map.is_stack_or_queue() {
            // push(): NULL-key update, LIFO/FIFO order handled at pop time.
            if map.value_queue.len() as u32 >= map.max_entries && map.max_entries > 0 {
                return Err(KernelError::new("map_update_elem", 28)); // ENOSPC
            }
            map.value_queue.push(value.to_vec());
            return Ok(());
        }
        let exists = map.entries.contains_key(key);
        match policy {
            UpdatePolicy::NoExist if exists => {
                return Err(KernelError::new("map_update_elem", 17)); // EEXIST
            }
            UpdatePolicy::Exist if !exists => {
                return Err(KernelError::new("map_update_elem", enoent()));
            }
            _ => {}
        }
        if !exists && map.entries.len() as u32 >= map.max_entries && map.max_entries > 0 {
            return Err(KernelError::new("map_update_elem", 28)); // ENOSPC
        }
        map.entries.insert(key.to_vec(), value.to_vec());
        map.push_order.push(key.to_vec());
        Ok(())
    }

    fn map_delete_elem(&self, fd: i32, key: &[u8]) -> Result<(), KernelError> {
        let mut maps = self.maps.lock().unwrap();
        let map = maps.get_mut(&fd).ok_or_else(|| KernelError::new("map_delete_elem", 9))?;
        if map.entries.remove(key).is_some() {
            map.push_order.retain(|k| k != key);
            Ok(())
        } else {
            Err(KernelError::new("map_delete_elem", enoent()))
        }
    }

    fn map_get_next_key(
        &self,
        fd: i32,
        key: Option<&[u8]>,
        next_key: &mut [u8],
    ) -> Result<(), KernelError> {
        let maps = self.maps.lock().unwrap();
        let map = maps.get(&fd).ok_or_else(|| KernelError::new("map_get_next_key", 9))?;
        let mut iter = map.entries.keys();
        let next = match key {
            None => iter.next(),
            Some(k) => {
                let mut found = false;
                let mut result = None;
                for cand in iter {
                    if found {
                        result = Some(cand);
                        break;
                    }
                    if cand.as_slice() == k {
                        found = true;
                    }
                }
                result
            }
        };
        match next {
            Some(k) => {
                next_key[..k.len()].copy_from_slice(k);
                Ok(())
            }
            None => Err(KernelError::new("map_get_next_key", enoent())),
        }
    }

    fn map_lookup_and_delete_elem(
        &self,
        fd: i32,
        key: Option<&[u8]>,
        value: &mut [u8],
    ) -> Result<(), KernelError> {
        let mut maps = self.maps.lock().unwrap();
        let map = maps
            .get_mut(&fd)
            .ok_or_else(|| KernelError::new("map_lookup_and_delete_elem", 9))?;
        if map.is_stack_or_queue() {
            // pop(): LIFO for stack, FIFO for queue, both NULL-keyed.
            let popped = if matches!(map.kind, MapKind::Stack) {
                map.value_queue.pop()
            } else if map.value_queue.is_empty() {
                None
            } else {
                Some(map.value_queue.remove(0))
            };
            return match popped {
                Some(v) => {
                    value[..v.len()].copy_from_slice(&v);
                    Ok(())
                }
                None => Err(KernelError::new("map_lookup_and_delete_elem", enoent())),
            };
        }
        let popped_key = match key {
            Some(k) => Some(k.to_vec()),
            None => return Err(KernelError::new("map_lookup_and_delete_elem", enoent())),
        };
        match popped_key {
            Some(k) => {
                let v = map
                    .entries
                    .remove(&k)
                    .ok_or_else(|| KernelError::new("map_lookup_and_delete_elem", enoent()))?;
                map.push_order.retain(|pk| pk != &k);
                value[..v.len()].copy_from_slice(&v);
                Ok(())
            }
            None => Err(KernelError::new("map_lookup_and_delete_elem", enoent())),
        }
    }

    fn map_lookup_batch(
        &self,
        fd: i32,
        keys: &mut [u8],
        values: &mut [u8],
        count: u32,
    ) -> Result<u32, KernelError> {
        if let Some(err) = self.maybe_einval("map_lookup_batch") {
            return Err(err);
        }
        let maps = self.maps.lock().unwrap();
        let map = maps.get(&fd).ok_or_else(|| KernelError::new("map_lookup_batch", 9))?;
        let key_size = map.key_size as usize;
        let value_size = values.len() / count.max(1) as usize;
        // `keys` arrives holding the caller's requested keys, packed in request
        // order; look each one up individually rather than dumping `entries` in
        // map order, which would silently answer for the wrong keys whenever the
        // map holds more entries than requested or the keys aren't byte-sorted.
        for i in 0..count as usize {
            let key = &keys[i * key_size..(i + 1) * key_size];
            let value = map
                .entries
                .get(key)
                .ok_or_else(|| KernelError::new("map_lookup_batch", enoent()))?;
            values[i * value_size..i * value_size + value.len()].copy_from_slice(value);
        }
        Ok(count)
    }

    fn map_update_batch(
        &self,
        fd: i32,
        keys: &[u8],
        values: &[u8],
        count: u32,
        policy: UpdatePolicy,
    ) -> Result<u32, KernelError> {
        if let Some(err) = self.maybe_einval("map_update_batch") {
            return Err(err);
        }
        let key_size = {
            let maps = self.maps.lock().unwrap();
            maps.get(&fd).ok_or_else(|| KernelError::new("map_update_batch", 9))?.key_size as usize
        };
        let value_size = values.len() / count.max(1) as usize;
        for i in 0..count as usize {
            let k = &keys[i * key_size..i * key_size + key_size];
            let v = &values[i * value_size..i * value_size + value_size];
            self.map_update_elem(fd, k, v, policy)?;
        }
        Ok(count)
    }

    fn map_delete_batch(&self, fd: i32, keys: &[u8], count: u32) -> Result<u32, KernelError> {
        if let Some(err) = self.maybe_einval("map_delete_batch") {
            return Err(err);
        }
        let key_size = {
            let maps = self.maps.lock().unwrap();
            maps.get(&fd).ok_or_else(|| KernelError::new("map_delete_batch", 9))?.key_size as usize
        };
        for i in 0..count as usize {
            let k = &keys[i * key_size..i * key_size + key_size];
            self.map_delete_elem(fd, k)?;
        }
        Ok(count)
    }

    fn map_lookup_and_delete_batch(
        &self,
        fd: i32,
        keys: &mut [u8],
        values: &mut [u8],
        count: u32,
    ) -> Result<u32, KernelError> {
        if let Some(err) = self.maybe_einval("map_lookup_and_delete_batch") {
            return Err(err);
        }
        let n = self.map_lookup_batch(fd, keys, values, count)?;
        let key_size = {
            let maps = self.maps.lock().unwrap();
            maps.get(&fd).unwrap().key_size as usize
        };
        for i in 0..n as usize {
            let k = keys[i * key_size..i * key_size + key_size].to_vec();
            self.map_delete_elem(fd, &k)?;
        }
        Ok(n)
    }

    fn obj_pin(&self, path: &str, fd: i32) -> Result<(), KernelError> {
        self.pins.lock().unwrap().insert(path.to_string(), fd);
        Ok(())
    }

    fn obj_get(&self, path: &str) -> Result<i32, KernelError> {
        self.pins
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| KernelError::new("obj_get", enoent()))
    }

    fn close(&self, fd: i32) -> Result<(), KernelError> {
        self.maps.lock().unwrap().remove(&fd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::MapKind;

    #[test]
    fn stack_pops_in_lifo_order() {
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::Stack, 0, 4, 8))
            .unwrap();
        sys.map_update_elem(fd, &[], &1i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        sys.map_update_elem(fd, &[], &2i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let mut out = [0u8; 4];
        sys.map_lookup_and_delete_elem(fd, None, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 2);
        sys.map_lookup_and_delete_elem(fd, None, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 1);
    }

    #[test]
    fn queue_pops_in_fifo_order() {
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::Queue, 0, 4, 8))
            .unwrap();
        sys.map_update_elem(fd, &[], &1i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        sys.map_update_elem(fd, &[], &2i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let mut out = [0u8; 4];
        sys.map_lookup_and_delete_elem(fd, None, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 1);
    }

    #[test]
    fn peek_does_not_remove() {
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::Stack, 0, 4, 8))
            .unwrap();
        sys.map_update_elem(fd, &[], &7i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let mut out = [0u8; 4];
        sys.map_lookup_elem(fd, &[], &mut out).unwrap();
        sys.map_lookup_elem(fd, &[], &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 7);
    }

    #[test]
    fn bloom_like_map_with_zero_key_size_still_keys_by_value() {
        // Bloom filters and ring buffers also have key_size == 0 but do
        // not follow the stack/queue NULL-key pop convention.
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::BloomFilter, 0, 4, 8))
            .unwrap();
        let member = 42i32.to_le_bytes();
        sys.map_update_elem(fd, &member, &member, UpdatePolicy::Any).unwrap();
        let mut out = [0u8; 4];
        assert!(sys.map_lookup_elem(fd, &member, &mut out).is_ok());
        assert!(sys.map_lookup_elem(fd, &99i32.to_le_bytes(), &mut out).is_err());
    }

    #[test]
    fn lpm_trie_lookup_returns_the_longest_matching_prefix() {
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::LpmTrie, 8, 4, 8))
            .unwrap();
        // 10.0.0.0/8 -> 1, 10.1.0.0/16 -> 2
        let mut key8 = 8u32.to_le_bytes().to_vec();
        key8.extend_from_slice(&[10, 0, 0, 0]);
        sys.map_update_elem(fd, &key8, &1i32.to_le_bytes(), UpdatePolicy::Any).unwrap();
        let mut key16 = 16u32.to_le_bytes().to_vec();
        key16.extend_from_slice(&[10, 1, 0, 0]);
        sys.map_update_elem(fd, &key16, &2i32.to_le_bytes(), UpdatePolicy::Any).unwrap();

        let mut query = 32u32.to_le_bytes().to_vec();
        query.extend_from_slice(&[10, 1, 2, 3]);
        let mut out = [0u8; 4];
        sys.map_lookup_elem(fd, &query, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 2);

        let mut query_other = 32u32.to_le_bytes().to_vec();
        query_other.extend_from_slice(&[10, 2, 2, 3]);
        sys.map_lookup_elem(fd, &query_other, &mut out).unwrap();
        assert_eq!(i32::from_le_bytes(out), 1);

        let mut query_miss = 32u32.to_le_bytes().to_vec();
        query_miss.extend_from_slice(&[192, 168, 0, 1]);
        assert!(sys.map_lookup_elem(fd, &query_miss, &mut out).is_err());
    }

    #[test]
    fn forced_einval_fires_once() {
        let sys = FakeBpfSyscall::new();
        let fd = sys
            .map_create(&MapCreateSpec::new(MapKind::Hash, 4, 4, 8))
            .unwrap();
        sys.force_einval_once("map_update_batch");
        let keys = 1i32.to_le_bytes();
        let values = 2i32.to_le_bytes();
        assert!(sys.map_update_batch(fd, &keys, &values, 1, UpdatePolicy::Any).is_err());
        assert!(sys.map_update_batch(fd, &keys, &values, 1, UpdatePolicy::Any).is_ok());
    }
}
