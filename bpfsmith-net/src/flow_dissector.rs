//! Flow-dissector DSL (spec.md §4.5): Ethernet/IPv4/IPv6/TCP/UDP header
//! walking into a `bpf_flow_keys` result.

use bpfsmith_core::{ops, ConstructionError, Item, IntoReg, JumpTarget};

use crate::common;

/// `bpf_flow_keys` field offsets actually populated by this DSL
/// (spec.md §4.5).
pub mod flow_keys_offsets {
    pub const NHOFF: i16 = 0;
    pub const THOFF: i16 = 2;
    pub const ADDR_PROTO: i16 = 4;
    pub const IS_FRAG: i16 = 6;
    pub const N_PROTO: i16 = 10;
    pub const SPORT: i16 = 12;
    pub const DPORT: i16 = 14;
}

pub const ETH_HEADER_LEN: i32 = 14;
pub const IPV4_MIN_HEADER_LEN: i32 = 20;
pub const IPV6_HEADER_LEN: i32 = 40;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum FlowDissectorVerdict {
    Ok = 0,
    Drop = -1,
}

impl FlowDissectorVerdict {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

pub fn section_name() -> &'static str {
    "flow_dissector"
}

/// Loads the 16-bit EtherType at offset 12 of a 14-byte Ethernet
/// header.
pub fn load_ethertype(dst: impl IntoReg, data_reg: impl IntoReg) -> Result<Item, ConstructionError> {
    ops::ldx(dst, data_reg, 12, 2)
}

/// Loads the IPv4 protocol byte (offset 9) given `data_reg` already
/// points past the Ethernet header.
pub fn load_ipv4_protocol(dst: impl IntoReg, ipv4_reg: impl IntoReg) -> Result<Item, ConstructionError> {
    ops::ldx(dst, ipv4_reg, 9, 1)
}

/// Loads the low nibble of the first IPv4 byte (the IHL, in 32-bit
/// words) -- callers multiply by 4 to get the header length in bytes.
pub fn load_ipv4_ihl(dst: impl IntoReg, ipv4_reg: impl IntoReg) -> Result<Item, ConstructionError> {
    ops::ldx(dst, ipv4_reg, 0, 1)
}

/// IPv6's next-header byte sits at a fixed offset 6, and its header is
/// always exactly 40 bytes -- no IHL-style computation needed.
pub fn load_ipv6_next_header(dst: impl IntoReg, ipv6_reg: impl IntoReg) -> Result<Item, ConstructionError> {
    ops::ldx(dst, ipv6_reg, 6, 1)
}

/// TCP/UDP source and destination ports are both 2-byte fields at
/// offsets 0 and 2 of the transport header.
pub fn load_ports(
    sport_dst: impl IntoReg,
    dport_dst: impl IntoReg,
    transport_reg: impl IntoReg + Copy,
) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::ldx(sport_dst, transport_reg, 0, 2)?,
        ops::ldx(dport_dst, transport_reg, 2, 2)?,
    ])
}

/// The canonical bounds-check, reused verbatim from [`crate::common`]
/// for each header the dissector walks into.
pub fn bounds_check(
    tmp: impl IntoReg + Copy,
    base: impl IntoReg,
    n: i32,
    limit: impl IntoReg,
    fail: impl Into<JumpTarget>,
) -> Result<Vec<Item>, ConstructionError> {
    common::bounds_check(tmp, base, n, limit, fail)
}

pub fn build(body: Vec<Item>, default_verdict: FlowDissectorVerdict) -> Result<Vec<Item>, ConstructionError> {
    let mut items = body;
    items.extend(common::epilogue(default_verdict.as_i32())?);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfsmith_core::Reg;

    #[test]
    fn header_lengths_match_protocol_constants() {
        assert_eq!(ETH_HEADER_LEN, 14);
        assert_eq!(IPV4_MIN_HEADER_LEN, 20);
        assert_eq!(IPV6_HEADER_LEN, 40);
    }

    #[test]
    fn verdict_values() {
        assert_eq!(FlowDissectorVerdict::Ok.as_i32(), 0);
        assert_eq!(FlowDissectorVerdict::Drop.as_i32(), -1);
    }

    #[test]
    fn section_name_matches_spec_shape() {
        assert_eq!(section_name(), "flow_dissector");
    }

    #[test]
    fn ports_load_two_adjacent_two_byte_fields() {
        let items = load_ports(Reg::R2, Reg::R3, Reg::R6).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn build_assembles() {
        let items = build(vec![], FlowDissectorVerdict::Ok).unwrap();
        bpfsmith_core::assemble(items).unwrap();
    }
}
