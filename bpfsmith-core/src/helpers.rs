//! Numeric helper-id catalog and the small set of protocol constants the
//! DSL crates share (spec.md §4.5/§6, component C11).

use crate::error::ConstructionError;

/// Kernel helper-function ids. Values MUST match the kernel's own
/// enumeration bit-exactly (spec.md §6).
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Helper {
    MapLookupElem = 1,
    MapUpdateElem = 2,
    MapDeleteElem = 3,
    KtimeGetNs = 5,
    GetSmpProcessorId = 8,
    SkbStoreBytes = 9,
    L3CsumReplace = 10,
    L4CsumReplace = 11,
    TailCall = 12,
    CloneRedirect = 13,
    GetCurrentPidTgid = 14,
    GetCurrentUidGid = 15,
    GetCurrentComm = 16,
    PerfEventOutput = 25,
    Redirect = 23,
    GetCurrentTask = 24,
    SkbLoadBytes = 26,
    GetStackid = 27,
    SkbChangeTail = 38,
    XdpAdjustHead = 44,
    ProbeReadStr = 45,
    RedirectMap = 51,
    SkRedirectMap = 52,
    SockMapUpdate = 53,
    XdpAdjustMeta = 54,
    MsgRedirectMap = 60,
    XdpAdjustTail = 65,
    SockHashUpdate = 70,
    MsgRedirectHash = 71,
    SkRedirectHash = 72,
    SkLookupTcp = 84,
    SkLookupUdp = 85,
    SkRelease = 86,
    ProbeReadKernel = 113,
    SkAssign = 124,
    SeqPrintf = 126,
    SeqWrite = 127,
}

impl Helper {
    pub const fn id(self) -> i32 {
        self as i32
    }

    pub fn by_name(name: &str) -> Result<Helper, ConstructionError> {
        use Helper::*;
        Ok(match name {
            "map_lookup_elem" => MapLookupElem,
            "map_update_elem" => MapUpdateElem,
            "map_delete_elem" => MapDeleteElem,
            "ktime_get_ns" => KtimeGetNs,
            "get_smp_processor_id" => GetSmpProcessorId,
            "skb_store_bytes" => SkbStoreBytes,
            "l3_csum_replace" => L3CsumReplace,
            "l4_csum_replace" => L4CsumReplace,
            "tail_call" => TailCall,
            "clone_redirect" => CloneRedirect,
            "get_current_pid_tgid" => GetCurrentPidTgid,
            "get_current_uid_gid" => GetCurrentUidGid,
            "get_current_comm" => GetCurrentComm,
            "perf_event_output" => PerfEventOutput,
            "redirect" => Redirect,
            "get_current_task" => GetCurrentTask,
            "skb_load_bytes" => SkbLoadBytes,
            "get_stackid" => GetStackid,
            "skb_change_tail" => SkbChangeTail,
            "xdp_adjust_head" => XdpAdjustHead,
            "probe_read_str" => ProbeReadStr,
            "redirect_map" => RedirectMap,
            "sk_redirect_map" => SkRedirectMap,
            "sock_map_update" => SockMapUpdate,
            "xdp_adjust_meta" => XdpAdjustMeta,
            "msg_redirect_map" => MsgRedirectMap,
            "xdp_adjust_tail" => XdpAdjustTail,
            "sock_hash_update" => SockHashUpdate,
            "msg_redirect_hash" => MsgRedirectHash,
            "sk_redirect_hash" => SkRedirectHash,
            "sk_lookup_tcp" => SkLookupTcp,
            "sk_lookup_udp" => SkLookupUdp,
            "sk_release" => SkRelease,
            "probe_read_kernel" => ProbeReadKernel,
            "sk_assign" => SkAssign,
            "seq_printf" => SeqPrintf,
            "seq_write" => SeqWrite,
            other => return Err(ConstructionError::UnknownHelper(other.to_string())),
        })
    }
}

/// Ethertype constants used by the flow-dissector / XDP L2 parsers.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const IPV6: u16 = 0x86DD;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
}

/// IP protocol numbers used by the L3/L4 parsers.
pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}

/// TCP flag bits, as laid out in the TCP header's flags byte.
pub mod tcp_flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
}

/// Attach-type ids for the fentry/fexit/modify-return family
/// (spec.md §6).
pub mod attach_type {
    pub const BPF_TRACE_FENTRY: u32 = 24;
    pub const BPF_TRACE_FEXIT: u32 = 25;
    pub const BPF_MODIFY_RETURN: u32 = 26;
}

/// Whether the running kernel is expected to support the `cmpxchg`/`xchg`
/// atomic variants, gated by kernel version (added in 5.12). Callers on
/// older kernels should fall back to a lock-free retry loop built from
/// plain `atomic_add`.
pub fn kernel_supports_atomic_fetch(major: u32, minor: u32) -> bool {
    major > 5 || (major == 5 && minor >= 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_ids_match_kernel_enumeration() {
        assert_eq!(Helper::MapLookupElem.id(), 1);
        assert_eq!(Helper::TailCall.id(), 12);
        assert_eq!(Helper::SeqWrite.id(), 127);
    }

    #[test]
    fn by_name_round_trips_known_helpers() {
        assert_eq!(Helper::by_name("tail_call").unwrap(), Helper::TailCall);
        assert!(Helper::by_name("no_such_helper").is_err());
    }

    #[test]
    fn atomic_fetch_gating_matches_5_12_cutoff() {
        assert!(!kernel_supports_atomic_fetch(5, 11));
        assert!(kernel_supports_atomic_fetch(5, 12));
        assert!(kernel_supports_atomic_fetch(6, 0));
    }
}
