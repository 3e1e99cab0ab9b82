use thiserror::Error;

/// A single BPF-map kernel operation that failed with a non-ENOENT errno.
/// ENOENT at lookup/delete/next-key is re-expressed as `None`/`false` at
/// the call site per spec.md §4.3 and is never represented here.
#[derive(Debug, Error)]
#[error("bpf map op `{op}` failed: errno {errno}")]
pub struct KernelError {
    pub op: &'static str,
    pub errno: i32,
}

impl KernelError {
    pub fn new(op: &'static str, errno: i32) -> Self {
        Self { op, errno }
    }
}
