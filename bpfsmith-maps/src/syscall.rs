//! The BPF syscall family, modeled as a trait per spec.md §6's "External
//! Interfaces": the kernel's `bpf(2)` multiplexer is an external
//! collaborator, and this module names only the calls the map runtime
//! actually makes on it. [`LinuxBpfSyscall`] is the real implementation;
//! tests substitute [`crate::fake::FakeBpfSyscall`] so the suite never
//! needs a live kernel.

use crate::error::KernelError;
use crate::kind::MapKind;

/// Update-policy flags for `map_update_elem`, encoded in the syscall's
/// third parameter (spec.md §6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    Any = 0,
    NoExist = 1,
    Exist = 2,
}

/// The shape passed to `map_create` (spec.md §6).
#[derive(Clone, Debug)]
pub struct MapCreateSpec {
    pub kind: MapKind,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
    pub name: Option<String>,
    pub inner_map_fd: Option<i32>,
    pub numa_node: Option<u32>,
    pub map_ifindex: Option<u32>,
    pub btf_fd: Option<i32>,
    pub btf_key_type_id: Option<u32>,
    pub btf_value_type_id: Option<u32>,
    pub btf_vmlinux_value_type_id: Option<u32>,
    pub map_extra: Option<u64>,
}

impl MapCreateSpec {
    pub fn new(kind: MapKind, key_size: u32, value_size: u32, max_entries: u32) -> Self {
        Self {
            kind,
            key_size,
            value_size,
            max_entries,
            flags: 0,
            name: None,
            inner_map_fd: None,
            numa_node: None,
            map_ifindex: None,
            btf_fd: None,
            btf_key_type_id: None,
            btf_value_type_id: None,
            btf_vmlinux_value_type_id: None,
            map_extra: None,
        }
    }
}

/// The handful of `bpf(2)` operations the map runtime needs. Everything
/// else about the syscall (program loading, link creation, ...) is
/// genuinely out of scope per spec.md §1.
pub trait BpfSyscall {
    fn map_create(&self, spec: &MapCreateSpec) -> Result<i32, KernelError>;
    fn map_lookup_elem(&self, fd: i32, key: &[u8], value: &mut [u8]) -> Result<(), KernelError>;
    fn map_update_elem(
        &self,
        fd: i32,
        key: &[u8],
        value: &[u8],
        policy: UpdatePolicy,
    ) -> Result<(), KernelError>;
    fn map_delete_elem(&self, fd: i32, key: &[u8]) -> Result<(), KernelError>;
    fn map_get_next_key(
        &self,
        fd: i32,
        key: Option<&[u8]>,
        next_key: &mut [u8],
    ) -> Result<(), KernelError>;
    fn map_lookup_and_delete_elem(
        &self,
        fd: i32,
        key: Option<&[u8]>,
        value: &mut [u8],
    ) -> Result<(), KernelError>;

    fn map_lookup_batch(
        &self,
        fd: i32,
        keys: &mut [u8],
        values: &mut [u8],
        count: u32,
    ) -> Result<u32, KernelError>;
    fn map_update_batch(
        &self,
        fd: i32,
        keys: &[u8],
        values: &[u8],
        count: u32,
        policy: UpdatePolicy,
    ) -> Result<u32, KernelError>;
    fn map_delete_batch(&self, fd: i32, keys: &[u8], count: u32) -> Result<u32, KernelError>;
    fn map_lookup_and_delete_batch(
        &self,
        fd: i32,
        keys: &mut [u8],
        values: &mut [u8],
        count: u32,
    ) -> Result<u32, KernelError>;

    fn obj_pin(&self, path: &str, fd: i32) -> Result<(), KernelError>;
    fn obj_get(&self, path: &str) -> Result<i32, KernelError>;
    fn close(&self, fd: i32) -> Result<(), KernelError>;
}

#[cfg(target_os = "linux")]
pub use linux::LinuxBpfSyscall;

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use std::ffi::CString;
    use std::io;
    use std::mem;

    #[cfg(target_arch = "x86_64")]
    const SYS_BPF: libc::c_long = 321;
    #[cfg(target_arch = "aarch64")]
    const SYS_BPF: libc::c_long = 280;
    #[cfg(target_arch = "riscv64")]
    const SYS_BPF: libc::c_long = 280;
    #[cfg(target_arch = "powerpc64")]
    const SYS_BPF: libc::c_long = 361;
    #[cfg(target_arch = "s390x")]
    const SYS_BPF: libc::c_long = 351;

    const BPF_MAP_CREATE: libc::c_long = 0;
    const BPF_MAP_LOOKUP_ELEM: libc::c_long = 1;
    const BPF_MAP_UPDATE_ELEM: libc::c_long = 2;
    const BPF_MAP_DELETE_ELEM: libc::c_long = 3;
    const BPF_MAP_GET_NEXT_KEY: libc::c_long = 4;
    const BPF_OBJ_PIN: libc::c_long = 6;
    const BPF_OBJ_GET: libc::c_long = 7;
    const BPF_MAP_LOOKUP_AND_DELETE_ELEM: libc::c_long = 21;
    const BPF_MAP_LOOKUP_BATCH: libc::c_long = 24;
    const BPF_MAP_LOOKUP_AND_DELETE_BATCH: libc::c_long = 25;
    const BPF_MAP_UPDATE_BATCH: libc::c_long = 26;
    const BPF_MAP_DELETE_BATCH: libc::c_long = 27;

    #[repr(C)]
    #[derive(Default)]
    struct MapCreateAttr {
        map_type: u32,
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        map_flags: u32,
        inner_map_fd: u32,
        numa_node: u32,
        map_name: [u8; 16],
        map_ifindex: u32,
        btf_fd: u32,
        btf_key_type_id: u32,
        btf_value_type_id: u32,
        btf_vmlinux_value_type_id: u32,
        map_extra: u64,
    }

    #[repr(C)]
    #[derive(Default)]
    struct ElemAttr {
        map_fd: u32,
        _pad: u32,
        key: u64,
        value_or_next_key: u64,
        flags: u64,
    }

    #[repr(C)]
    #[derive(Default)]
    struct BatchAttr {
        in_batch: u64,
        out_batch: u64,
        keys: u64,
        values: u64,
        count: u32,
        map_fd: u32,
        elem_flags: u64,
        flags: u64,
    }

    #[repr(C)]
    #[derive(Default)]
    struct ObjAttr {
        pathname: u64,
        bpf_fd: u32,
        file_flags: u32,
    }

    fn bpf_syscall<T>(cmd: libc::c_long, attr: &T, op: &'static str) -> Result<libc::c_long, KernelError> {
        let ret = unsafe {
            libc::syscall(SYS_BPF, cmd, attr as *const T as *const libc::c_void, mem::size_of::<T>())
        };
        if ret < 0 {
            let errno = io::Error::last_os_error().raw_os_error().unwrap_or(-1);
            log::debug!("bpf({op}) failed: errno={errno}");
            Err(KernelError::new(op, errno))
        } else {
            Ok(ret)
        }
    }

    /// The real `bpf(2)` multiplexer, invoked via the raw Linux syscall
    /// (no libbpf dependency -- this toolkit is the loader).
    #[derive(Default, Clone, Copy)]
    pub struct LinuxBpfSyscall;

    impl BpfSyscall for LinuxBpfSyscall {
        fn map_create(&self, spec: &MapCreateSpec) -> Result<i32, KernelError> {
            let mut attr = MapCreateAttr {
                map_type: spec.kind.as_u32(),
                key_size: spec.key_size,
                value_size: spec.value_size,
                max_entries: spec.max_entries,
                map_flags: spec.flags,
                ..Default::default()
            };
            if let Some(name) = &spec.name {
                let bytes = name.as_bytes();
                let n = bytes.len().min(15);
                attr.map_name[..n].copy_from_slice(&bytes[..n]);
            }
            if let Some(fd) = spec.inner_map_fd {
                attr.inner_map_fd = fd as u32;
            }
            if let Some(node) = spec.numa_node {
                attr.numa_node = node;
            }
            if let Some(ifindex) = spec.map_ifindex {
                attr.map_ifindex = ifindex;
            }
            if let Some(fd) = spec.btf_fd {
                attr.btf_fd = fd as u32;
            }
            if let Some(id) = spec.btf_key_type_id {
                attr.btf_key_type_id = id;
            }
            if let Some(id) = spec.btf_value_type_id {
                attr.btf_value_type_id = id;
            }
            if let Some(id) = spec.btf_vmlinux_value_type_id {
                attr.btf_vmlinux_value_type_id = id;
            }
            if let Some(extra) = spec.map_extra {
                attr.map_extra = extra;
            }
            bpf_syscall(BPF_MAP_CREATE, &attr, "map_create").map(|fd| fd as i32)
        }

        fn map_lookup_elem(&self, fd: i32, key: &[u8], value: &mut [u8]) -> Result<(), KernelError> {
            let attr = ElemAttr {
                map_fd: fd as u32,
                key: key.as_ptr() as u64,
                value_or_next_key: value.as_mut_ptr() as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_LOOKUP_ELEM, &attr, "map_lookup_elem").map(|_| ())
        }

        fn map_update_elem(
            &self,
            fd: i32,
            key: &[u8],
            value: &[u8],
            policy: UpdatePolicy,
        ) -> Result<(), KernelError> {
            let attr = ElemAttr {
                map_fd: fd as u32,
                key: key.as_ptr() as u64,
                value_or_next_key: value.as_ptr() as u64,
                flags: policy as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_UPDATE_ELEM, &attr, "map_update_elem").map(|_| ())
        }

        fn map_delete_elem(&self, fd: i32, key: &[u8]) -> Result<(), KernelError> {
            let attr = ElemAttr {
                map_fd: fd as u32,
                key: key.as_ptr() as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_DELETE_ELEM, &attr, "map_delete_elem").map(|_| ())
        }

        fn map_get_next_key(
            &self,
            fd: i32,
            key: Option<&[u8]>,
            next_key: &mut [u8],
        ) -> Result<(), KernelError> {
            let attr = ElemAttr {
                map_fd: fd as u32,
                key: key.map(|k| k.as_ptr() as u64).unwrap_or(0),
                value_or_next_key: next_key.as_mut_ptr() as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_GET_NEXT_KEY, &attr, "map_get_next_key").map(|_| ())
        }

        fn map_lookup_and_delete_elem(
            &self,
            fd: i32,
            key: Option<&[u8]>,
            value: &mut [u8],
        ) -> Result<(), KernelError> {
            let attr = ElemAttr {
                map_fd: fd as u32,
                key: key.map(|k| k.as_ptr() as u64).unwrap_or(0),
                value_or_next_key: value.as_mut_ptr() as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_LOOKUP_AND_DELETE_ELEM, &attr, "map_lookup_and_delete_elem")
                .map(|_| ())
        }

        fn map_lookup_batch(
            &self,
            fd: i32,
            keys: &mut [u8],
            values: &mut [u8],
            count: u32,
        ) -> Result<u32, KernelError> {
            let mut attr = BatchAttr {
                keys: keys.as_mut_ptr() as u64,
                values: values.as_mut_ptr() as u64,
                count,
                map_fd: fd as u32,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_LOOKUP_BATCH, &attr, "map_lookup_batch")?;
            Ok(std::mem::replace(&mut attr.count, 0))
        }

        fn map_update_batch(
            &self,
            fd: i32,
            keys: &[u8],
            values: &[u8],
            count: u32,
            policy: UpdatePolicy,
        ) -> Result<u32, KernelError> {
            let mut attr = BatchAttr {
                keys: keys.as_ptr() as u64,
                values: values.as_ptr() as u64,
                count,
                map_fd: fd as u32,
                elem_flags: policy as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_UPDATE_BATCH, &attr, "map_update_batch")?;
            Ok(std::mem::replace(&mut attr.count, 0))
        }

        fn map_delete_batch(&self, fd: i32, keys: &[u8], count: u32) -> Result<u32, KernelError> {
            let mut attr = BatchAttr {
                keys: keys.as_ptr() as u64,
                count,
                map_fd: fd as u32,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_DELETE_BATCH, &attr, "map_delete_batch")?;
            Ok(std::mem::replace(&mut attr.count, 0))
        }

        fn map_lookup_and_delete_batch(
            &self,
            fd: i32,
            keys: &mut [u8],
            values: &mut [u8],
            count: u32,
        ) -> Result<u32, KernelError> {
            let mut attr = BatchAttr {
                keys: keys.as_mut_ptr() as u64,
                values: values.as_mut_ptr() as u64,
                count,
                map_fd: fd as u32,
                ..Default::default()
            };
            bpf_syscall(BPF_MAP_LOOKUP_AND_DELETE_BATCH, &attr, "map_lookup_and_delete_batch")?;
            Ok(std::mem::replace(&mut attr.count, 0))
        }

        fn obj_pin(&self, path: &str, fd: i32) -> Result<(), KernelError> {
            let c_path = CString::new(path).map_err(|_| KernelError::new("obj_pin", libc::EINVAL))?;
            let attr = ObjAttr {
                pathname: c_path.as_ptr() as u64,
                bpf_fd: fd as u32,
                file_flags: 0,
            };
            bpf_syscall(BPF_OBJ_PIN, &attr, "obj_pin").map(|_| ())
        }

        fn obj_get(&self, path: &str) -> Result<i32, KernelError> {
            let c_path = CString::new(path).map_err(|_| KernelError::new("obj_get", libc::EINVAL))?;
            let attr = ObjAttr {
                pathname: c_path.as_ptr() as u64,
                ..Default::default()
            };
            bpf_syscall(BPF_OBJ_GET, &attr, "obj_get").map(|fd| fd as i32)
        }

        fn close(&self, fd: i32) -> Result<(), KernelError> {
            let ret = unsafe { libc::close(fd) };
            if ret < 0 {
                let errno = io::Error::last_os_error().raw_os_error().unwrap_or(-1);
                Err(KernelError::new("close", errno))
            } else {
                Ok(())
            }
        }
    }
}
