//! Per-CPU map support (spec.md §4.3 "Per-CPU maps" and §9's
//! `per_cpu_size: Option<usize>` normalization). The kernel requires the
//! caller to pre-compute `stride = per_cpu_size * n_cpus`; this module
//! owns that arithmetic and the lane aggregators.

use crate::error::KernelError;
use crate::handle::MapHandle;
use crate::syscall::BpfSyscall;

/// Number of CPUs on the host, used to size per-CPU value buffers.
pub fn num_possible_cpus() -> usize {
    #[cfg(target_os = "linux")]
    {
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
        if n > 0 {
            return n as usize;
        }
    }
    1
}

/// Splits a raw per-CPU value buffer into one slice per CPU lane.
fn lanes<'a>(raw: &'a [u8], per_cpu_size: usize, n_cpus: usize) -> Vec<&'a [u8]> {
    (0..n_cpus).map(|i| &raw[i * per_cpu_size..(i + 1) * per_cpu_size]).collect()
}

impl<S: BpfSyscall> MapHandle<S> {
    /// Total stride for a per-CPU lookup/update buffer. Panics if this
    /// handle is not a per-CPU map; callers are expected to check
    /// [`MapHandle::per_cpu_size`] first.
    pub fn percpu_stride(&self, n_cpus: usize) -> usize {
        self.per_cpu_size.expect("percpu_stride called on a non-per-CPU map") * n_cpus
    }

    /// Reads every per-CPU lane for `key`, ordered by CPU index.
    pub fn lookup_percpu(&self, key: &[u8], n_cpus: usize) -> Result<Option<Vec<Vec<u8>>>, KernelError> {
        let per_cpu_size = self.per_cpu_size.expect("lookup_percpu called on a non-per-CPU map");
        let stride = per_cpu_size * n_cpus;
        let mut raw = vec![0u8; stride];
        match self.syscall().map_lookup_elem(self.fd(), key, &mut raw) {
            Ok(()) => Ok(Some(lanes(&raw, per_cpu_size, n_cpus).into_iter().map(|s| s.to_vec()).collect())),
            Err(e) if e.errno == crate::handle::libc_enoent() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes one value per CPU lane, in the same order `lookup_percpu`
    /// returns them.
    pub fn update_percpu(
        &self,
        key: &[u8],
        per_lane: &[Vec<u8>],
        policy: crate::syscall::UpdatePolicy,
    ) -> Result<(), KernelError> {
        let per_cpu_size = self.per_cpu_size.expect("update_percpu called on a non-per-CPU map");
        let mut raw = vec![0u8; per_cpu_size * per_lane.len()];
        for (i, lane) in per_lane.iter().enumerate() {
            raw[i * per_cpu_size..i * per_cpu_size + lane.len()].copy_from_slice(lane);
        }
        self.syscall().map_update_elem(self.fd(), key, &raw, policy)
    }
}

/// Sums per-CPU lanes interpreted as little-endian `u64`.
pub fn sum_u64(lanes: &[Vec<u8>]) -> u64 {
    lanes.iter().map(|l| u64::from_le_bytes(l[..8].try_into().unwrap())).sum()
}

pub fn min_u64(lanes: &[Vec<u8>]) -> Option<u64> {
    lanes.iter().map(|l| u64::from_le_bytes(l[..8].try_into().unwrap())).min()
}

pub fn max_u64(lanes: &[Vec<u8>]) -> Option<u64> {
    lanes.iter().map(|l| u64::from_le_bytes(l[..8].try_into().unwrap())).max()
}

pub fn avg_u64(lanes: &[Vec<u8>]) -> Option<f64> {
    if lanes.is_empty() {
        return None;
    }
    Some(sum_u64(lanes) as f64 / lanes.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBpfSyscall;
    use crate::kind::MapKind;
    use crate::syscall::{MapCreateSpec, UpdatePolicy};

    fn percpu_handle(n_cpus: usize) -> MapHandle<FakeBpfSyscall> {
        let mut spec = MapCreateSpec::new(MapKind::PercpuArray, 4, 8, 4);
        spec.value_size = 8 * n_cpus as u32; // fake syscall stores the full stride as the value
        MapHandle::create(FakeBpfSyscall::new(), spec).unwrap()
    }

    #[test]
    fn lookup_percpu_splits_stride_into_ordered_lanes() {
        let n_cpus = 4;
        let h = percpu_handle(n_cpus);
        let lanes: Vec<Vec<u8>> = (0..n_cpus as u64).map(|i| (i * 10).to_le_bytes().to_vec()).collect();
        h.update_percpu(&0i32.to_le_bytes(), &lanes, UpdatePolicy::Any).unwrap();
        let got = h.lookup_percpu(&0i32.to_le_bytes(), n_cpus).unwrap().unwrap();
        assert_eq!(got.len(), n_cpus);
        assert_eq!(u64::from_le_bytes(got[2].clone().try_into().unwrap()), 20);
    }

    #[test]
    fn aggregators_satisfy_sum_equals_count_times_avg() {
        let lanes: Vec<Vec<u8>> = vec![1u64, 2, 3, 4].into_iter().map(|v| v.to_le_bytes().to_vec()).collect();
        let sum = sum_u64(&lanes);
        let avg = avg_u64(&lanes).unwrap();
        assert_eq!(sum as f64, avg * lanes.len() as f64);
        assert_eq!(min_u64(&lanes), Some(1));
        assert_eq!(max_u64(&lanes), Some(4));
    }
}
