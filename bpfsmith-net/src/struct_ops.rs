//! `struct_ops` DSL (spec.md §4.5): the TCP congestion-control callback
//! ABI, the one `struct_ops` family in wide production use.
//!
//! TCP-socket field offsets are kernel-version-dependent; production
//! code should resolve them through BTF (see [`crate::fentry::BtfResolver`])
//! rather than a hardcoded table (spec.md §9, fourth open question --
//! recorded in DESIGN.md). This module only fixes the callback argument
//! conventions, which are ABI and do not change across kernel versions.

use bpfsmith_core::{ConstructionError, Item, Reg};

use crate::common;

/// The `tcp_congestion_ops` callbacks this DSL covers and how many
/// arguments each receives in `r1..=r5` (the first argument is always
/// `struct sock *sk`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CongestionCallback {
    Init,
    Release,
    Ssthresh,
    CongAvoid,
    SetState,
    CwndEvent,
    PktsAcked,
    UndoCwnd,
    CongControl,
}

impl CongestionCallback {
    /// Argument count including `sk`.
    pub const fn arg_count(self) -> u8 {
        match self {
            CongestionCallback::Init => 1,
            CongestionCallback::Release => 1,
            CongestionCallback::Ssthresh => 1,
            CongestionCallback::CongAvoid => 3,
            CongestionCallback::SetState => 2,
            CongestionCallback::CwndEvent => 2,
            CongestionCallback::PktsAcked => 2,
            CongestionCallback::UndoCwnd => 1,
            CongestionCallback::CongControl => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CongestionCallback::Init => "init",
            CongestionCallback::Release => "release",
            CongestionCallback::Ssthresh => "ssthresh",
            CongestionCallback::CongAvoid => "cong_avoid",
            CongestionCallback::SetState => "set_state",
            CongestionCallback::CwndEvent => "cwnd_event",
            CongestionCallback::PktsAcked => "pkts_acked",
            CongestionCallback::UndoCwnd => "undo_cwnd",
            CongestionCallback::CongControl => "cong_control",
        }
    }
}

/// `"struct_ops/<struct>/<callback>"` (spec.md §4.5).
pub fn section_name(struct_name: &str, callback: CongestionCallback) -> String {
    format!("struct_ops/{struct_name}/{}", callback.name())
}

/// The `sk` argument always arrives in `r1`.
pub const SK_REG: Reg = Reg::R1;

/// Reads argument `index` (0-based, 0 is always `sk`) directly out of
/// `r1..=r5`, erroring if `index` exceeds the callback's declared
/// arity.
pub fn load_arg(callback: CongestionCallback, index: u8) -> Result<Reg, ConstructionError> {
    if index >= callback.arg_count() {
        return Err(ConstructionError::InvalidRegister(index));
    }
    match index {
        0 => Ok(Reg::R1),
        1 => Ok(Reg::R2),
        2 => Ok(Reg::R3),
        3 => Ok(Reg::R4),
        4 => Ok(Reg::R5),
        _ => unreachable!(),
    }
}

/// Wraps `body` in an epilogue returning `result` in `r0`. Callbacks
/// with no meaningful return value (e.g. `set_state`, `cwnd_event`)
/// still formally return in `r0`; callers pass 0.
pub fn build(body: Vec<Item>, result: i32) -> Result<Vec<Item>, ConstructionError> {
    let mut items = body;
    items.extend(common::epilogue(result)?);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_counts_match_the_tcp_congestion_ops_abi() {
        assert_eq!(CongestionCallback::Ssthresh.arg_count(), 1);
        assert_eq!(CongestionCallback::CongAvoid.arg_count(), 3);
        assert_eq!(CongestionCallback::SetState.arg_count(), 2);
        assert_eq!(CongestionCallback::CongControl.arg_count(), 3);
    }

    #[test]
    fn section_names() {
        assert_eq!(section_name("my_cc", CongestionCallback::Ssthresh), "struct_ops/my_cc/ssthresh");
        assert_eq!(section_name("my_cc", CongestionCallback::CongAvoid), "struct_ops/my_cc/cong_avoid");
    }

    #[test]
    fn load_arg_rejects_out_of_range_index() {
        assert!(load_arg(CongestionCallback::Ssthresh, 1).is_err());
        assert_eq!(load_arg(CongestionCallback::CongAvoid, 2).unwrap(), Reg::R3);
    }

    #[test]
    fn build_assembles() {
        let items = build(vec![], 0).unwrap();
        bpfsmith_core::assemble(items).unwrap();
    }
}
