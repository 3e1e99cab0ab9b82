//! Perf-event and `bpf_iter` DSL pieces (spec.md §4.5): both program
//! types are thin -- perf-event handlers get a PMU sample context and
//! return nothing the verifier inspects, iterators get a `bpf_iter_meta`
//! plus a type-specific pointer and return a continue/stop verdict.

use bpfsmith_core::{ConstructionError, Item};

use crate::common;

/// `bpf_perf_event_data` field offsets covering the registers sub-struct
/// and the sample metadata that follows it (spec.md §4.5).
pub mod perf_event_data_offsets {
    pub const REGS: i16 = 0;
    pub const SAMPLE_PERIOD: i16 = 112;
    pub const ADDR: i16 = 120;
}

pub fn perf_event_section() -> &'static str {
    "perf_event"
}

/// `bpf_iter_meta` field offsets (spec.md §4.5).
pub mod iter_meta_offsets {
    pub const SEQ: i16 = 0;
    pub const SESSION_ID: i16 = 8;
    pub const SEQ_NUM: i16 = 12;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum IterVerdict {
    Continue = 0,
    Stop = 1,
}

impl IterVerdict {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// `"iter/<btf_name>"`, e.g. `"iter/task"`, `"iter/bpf_map"`.
pub fn iter_section(btf_name: &str) -> String {
    format!("iter/{btf_name}")
}

pub fn build_perf_event(body: Vec<Item>) -> Result<Vec<Item>, ConstructionError> {
    let mut items = body;
    items.extend(common::epilogue(0)?);
    Ok(items)
}

pub fn build_iter(body: Vec<Item>, default_verdict: IterVerdict) -> Result<Vec<Item>, ConstructionError> {
    let mut items = body;
    items.extend(common::epilogue(default_verdict.as_i32())?);
    Ok(items)
}
