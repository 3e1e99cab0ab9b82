//! Socket-family DSLs: classic socket filters, `BPF_PROG_TYPE_SK_LOOKUP`,
//! `SK_SKB`, and `SK_MSG` (spec.md §4.5).

use bpfsmith_core::{ops, ConstructionError, Item, IntoReg, Reg};

use crate::common;

/// Socket filters return 0 to drop the packet or a positive length (in
/// bytes, capped to the packet length) to accept it truncated to that
/// many bytes.
pub mod socket_filter {
    pub const REJECT: i32 = 0;
    pub const ACCEPT_FULL: i32 = -1; // conventionally 0xffffffff / "whole packet"
}

/// `bpf_sk_lookup` field offsets (spec.md §4.5).
pub mod sk_lookup_offsets {
    pub const FAMILY: i16 = 8;
    pub const PROTOCOL: i16 = 12;
    pub const REMOTE_IP4: i16 = 16;
    pub const LOCAL_IP4: i16 = 40;
    pub const REMOTE_PORT: i16 = 36;
    pub const LOCAL_PORT: i16 = 60;
}

/// Shared by SK_LOOKUP, SK_SKB, and SK_MSG: drop or pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum SockVerdict {
    Drop = 0,
    Pass = 1,
}

impl SockVerdict {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

pub fn sk_lookup_section_name() -> &'static str {
    "sk_lookup"
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkSkbHook {
    StreamParser,
    StreamVerdict,
}

pub fn sk_skb_section_name(hook: SkSkbHook) -> &'static str {
    match hook {
        SkSkbHook::StreamParser => "sk_skb/stream_parser",
        SkSkbHook::StreamVerdict => "sk_skb/stream_verdict",
    }
}

pub fn sk_msg_section_name() -> &'static str {
    "sk_msg"
}

pub fn socket_section_name() -> &'static str {
    "socket"
}

/// Builds a classic socket-filter program: prologue loads nothing
/// extra (the context register is the `skb` itself), body decides a
/// length, epilogue returns it in `r0`.
pub fn build_socket_filter(ctx_reg: impl IntoReg + Copy, body: Vec<Item>, default_len: i32) -> Result<Vec<Item>, ConstructionError> {
    let mut items = common::save_context(ctx_reg)?;
    items.extend(body);
    items.extend(common::epilogue(default_len)?);
    Ok(items)
}

/// Builds an SK_LOOKUP/SK_SKB/SK_MSG program sharing the drop/pass
/// verdict convention.
pub fn build_verdict_program(
    ctx_reg: impl IntoReg + Copy,
    body: Vec<Item>,
    default_verdict: SockVerdict,
) -> Result<Vec<Item>, ConstructionError> {
    let mut items = common::save_context(ctx_reg)?;
    items.extend(body);
    items.extend(common::epilogue(default_verdict.as_i32())?);
    Ok(items)
}

/// `bpf_sk_redirect_map(skb, map_fd, key, flags)`, used from SK_SKB.
pub fn sk_redirect_map(map_fd: i32, key: i32, flags: i32) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::mov(Reg::R2, map_fd)?,
        ops::mov(Reg::R3, key)?,
        ops::mov(Reg::R4, flags)?,
        ops::call(bpfsmith_core::Helper::SkRedirectMap.id()),
    ])
}

/// `bpf_msg_redirect_map(msg, map_fd, key, flags)`, used from SK_MSG.
pub fn msg_redirect_map(map_fd: i32, key: i32, flags: i32) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::mov(Reg::R2, map_fd)?,
        ops::mov(Reg::R3, key)?,
        ops::mov(Reg::R4, flags)?,
        ops::call(bpfsmith_core::Helper::MsgRedirectMap.id()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_values_match_spec_table() {
        assert_eq!(SockVerdict::Drop.as_i32(), 0);
        assert_eq!(SockVerdict::Pass.as_i32(), 1);
    }

    #[test]
    fn section_names() {
        assert_eq!(sk_lookup_section_name(), "sk_lookup");
        assert_eq!(sk_skb_section_name(SkSkbHook::StreamParser), "sk_skb/stream_parser");
        assert_eq!(sk_skb_section_name(SkSkbHook::StreamVerdict), "sk_skb/stream_verdict");
        assert_eq!(sk_msg_section_name(), "sk_msg");
        assert_eq!(socket_section_name(), "socket");
    }

    #[test]
    fn socket_filter_program_assembles() {
        let items = build_socket_filter(Reg::R1, vec![], 64).unwrap();
        bpfsmith_core::assemble(items).unwrap();
    }

    #[test]
    fn verdict_program_assembles() {
        let items = build_verdict_program(Reg::R1, vec![], SockVerdict::Pass).unwrap();
        bpfsmith_core::assemble(items).unwrap();
    }
}
