/// The map shapes spec.md §3 requires the handle to distinguish by kind
/// tag. Values match the kernel's `bpf_map_type` enumeration.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKind {
    Hash = 1,
    Array = 2,
    ProgArray = 3,
    PerfEventArray = 4,
    PercpuHash = 5,
    PercpuArray = 6,
    StackTrace = 7,
    CgroupArray = 8,
    LruHash = 9,
    LruPercpuHash = 10,
    LpmTrie = 11,
    ArrayOfMaps = 12,
    HashOfMaps = 13,
    DevMap = 14,
    SockMap = 15,
    CpuMap = 16,
    XskMap = 17,
    SockHash = 18,
    RingBuf = 27,
    DevMapHash = 30,
    BloomFilter = 31,
    Queue = 22,
    Stack = 23,
}

impl MapKind {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Stack/queue/ring-buffer/bloom-filter maps have no key; the kernel
    /// requires `key_size == 0` for them (spec.md §3).
    pub const fn has_no_key(self) -> bool {
        matches!(
            self,
            MapKind::Queue | MapKind::Stack | MapKind::RingBuf | MapKind::BloomFilter
        )
    }

    pub const fn is_per_cpu(self) -> bool {
        matches!(self, MapKind::PercpuHash | MapKind::PercpuArray | MapKind::LruPercpuHash)
    }

    pub const fn is_map_in_map(self) -> bool {
        matches!(self, MapKind::ArrayOfMaps | MapKind::HashOfMaps)
    }
}
