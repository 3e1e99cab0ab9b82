//! Convenience wrappers for map kinds that differ from the general
//! handle only in kind tag and key/value shape (spec.md §4.3 "Stack/queue
//! maps", "Bloom filter", "Specialized redirect maps").

use crate::error::KernelError;
use crate::handle::MapHandle;
use crate::kind::MapKind;
use crate::syscall::{BpfSyscall, UpdatePolicy};

impl<S: BpfSyscall> MapHandle<S> {
    /// `push(v)`: kernel update with a NULL key. Valid on stack/queue
    /// maps only; the kernel itself enforces `key_size == 0`.
    pub fn push(&self, value: &[u8]) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::Stack | MapKind::Queue));
        self.update(&[], value, UpdatePolicy::Any)
    }

    /// `pop()`: atomic lookup-and-delete with a NULL key. LIFO for
    /// stack, FIFO for queue -- the kernel, not this wrapper, decides
    /// the order based on the map's kind.
    pub fn pop(&self) -> Result<Option<Vec<u8>>, KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::Stack | MapKind::Queue));
        let mut value = vec![0u8; self.value_size() as usize];
        match self.syscall().map_lookup_and_delete_elem(self.fd(), None, &mut value) {
            Ok(()) => Ok(Some(value)),
            Err(e) if e.errno == crate::handle::libc_enoent() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `peek()`: lookup with a NULL key, leaving the element in place.
    pub fn peek(&self) -> Result<Option<Vec<u8>>, KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::Stack | MapKind::Queue));
        self.lookup(&[])
    }

    /// `add(bytes)`: update with the value serving as the key
    /// (spec.md §4.3 "Bloom filter").
    pub fn bloom_add(&self, bytes: &[u8]) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::BloomFilter));
        self.update(bytes, bytes, UpdatePolicy::Any)
    }

    /// `check(bytes)`: lookup with the value as the key. Returns `true`
    /// when the kernel reports the member as possibly present (lookup
    /// succeeds) and `false` when it reports ENOENT-absence (definitely
    /// not in the set) -- the resolution of spec.md §9's first open
    /// question, recorded in DESIGN.md.
    pub fn bloom_check(&self, bytes: &[u8]) -> Result<bool, KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::BloomFilter));
        Ok(self.lookup(bytes)?.is_some())
    }

    /// `devmap`/`devmap_hash`: interface index keyed by an arbitrary
    /// lookup key (array index for devmap, hash key for devmap_hash).
    pub fn devmap_set(&self, key: &[u8], ifindex: u32) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::DevMap | MapKind::DevMapHash));
        self.update(key, &ifindex.to_ne_bytes(), UpdatePolicy::Any)
    }

    /// `sockmap`/`sockhash`: socket FD keyed by an arbitrary lookup key.
    pub fn sockmap_set(&self, key: &[u8], sock_fd: i32) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::SockMap | MapKind::SockHash));
        self.update(key, &sock_fd.to_ne_bytes(), UpdatePolicy::Any)
    }

    /// `xskmap`: AF_XDP socket FD keyed by RX queue index.
    pub fn xskmap_set(&self, queue_index: u32, xsk_fd: i32) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::XskMap));
        self.update(&queue_index.to_ne_bytes(), &xsk_fd.to_ne_bytes(), UpdatePolicy::Any)
    }

    /// `cpumap`: per-CPU queue-size record keyed by CPU index.
    pub fn cpumap_set(&self, cpu: u32, queue_size: u32) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::CpuMap));
        self.update(&cpu.to_ne_bytes(), &queue_size.to_ne_bytes(), UpdatePolicy::Any)
    }

    /// `lpm_trie` insert: the kernel's key format is `{prefixlen: u32
    /// LE, data}`; this wrapper builds that key from the prefix length
    /// and the raw data bytes (e.g. a 4-byte IPv4 address).
    pub fn lpm_update(&self, prefix_len: u32, data: &[u8], value: &[u8]) -> Result<(), KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::LpmTrie));
        let mut key = prefix_len.to_le_bytes().to_vec();
        key.extend_from_slice(data);
        self.update(&key, value, UpdatePolicy::Any)
    }

    /// `lpm_trie` longest-prefix-match lookup. The kernel's trie search
    /// ignores the query key's own `prefixlen` field and matches on the
    /// full data length, so this wrapper always sends a maximal
    /// prefixlen alongside `data`.
    pub fn lpm_lookup(&self, data: &[u8]) -> Result<Option<Vec<u8>>, KernelError> {
        debug_assert!(matches!(self.kind(), MapKind::LpmTrie));
        let mut key = ((data.len() * 8) as u32).to_le_bytes().to_vec();
        key.extend_from_slice(data);
        self.lookup(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBpfSyscall;
    use crate::syscall::MapCreateSpec;

    #[test]
    fn stack_push_pop_peek() {
        let h = MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::Stack, 0, 4, 4)).unwrap();
        h.push(&1i32.to_le_bytes()).unwrap();
        h.push(&2i32.to_le_bytes()).unwrap();
        assert_eq!(h.peek().unwrap(), Some(2i32.to_le_bytes().to_vec()));
        assert_eq!(h.pop().unwrap(), Some(2i32.to_le_bytes().to_vec()));
        assert_eq!(h.pop().unwrap(), Some(1i32.to_le_bytes().to_vec()));
        assert_eq!(h.pop().unwrap(), None);
    }

    #[test]
    fn bloom_check_is_false_before_add_and_true_after() {
        let h = MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::BloomFilter, 0, 4, 8)).unwrap();
        let member = 7i32.to_le_bytes();
        assert!(!h.bloom_check(&member).unwrap());
        h.bloom_add(&member).unwrap();
        assert!(h.bloom_check(&member).unwrap());
    }

    #[test]
    fn lpm_lookup_returns_the_longest_matching_prefix() {
        let h = MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::LpmTrie, 8, 4, 8)).unwrap();
        h.lpm_update(8, &[10, 0, 0, 0], &1i32.to_le_bytes()).unwrap();
        h.lpm_update(16, &[10, 1, 0, 0], &2i32.to_le_bytes()).unwrap();
        assert_eq!(h.lpm_lookup(&[10, 1, 2, 3]).unwrap(), Some(2i32.to_le_bytes().to_vec()));
        assert_eq!(h.lpm_lookup(&[10, 2, 2, 3]).unwrap(), Some(1i32.to_le_bytes().to_vec()));
        assert_eq!(h.lpm_lookup(&[192, 168, 0, 1]).unwrap(), None);
    }

    #[test]
    fn devmap_set_stores_ifindex() {
        let h = MapHandle::create(FakeBpfSyscall::new(), MapCreateSpec::new(MapKind::DevMap, 4, 4, 8)).unwrap();
        h.devmap_set(&0u32.to_ne_bytes(), 3).unwrap();
        assert_eq!(h.lookup(&0u32.to_ne_bytes()).unwrap(), Some(3u32.to_ne_bytes().to_vec()));
    }
}
