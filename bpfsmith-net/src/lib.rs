//! Typed DSLs for the program types kernel attach points expect, built
//! on `bpfsmith-core`'s instruction encoder (spec.md §4.5, component
//! C6-C10): XDP, TC, the socket-family programs, fentry/fexit/LSM,
//! flow-dissector, struct_ops, and perf-event/iterator handlers.
//!
//! Every module shares the prologue/epilogue/bounds-check conventions
//! in [`common`] and exposes its own verdict enumeration plus a
//! `section_name`-style function producing the ELF section name the
//! loader inspects to infer program type and attach point.

pub mod common;
pub mod fentry;
pub mod flow_dissector;
pub mod perf_iter;
pub mod socket;
pub mod struct_ops;
pub mod tc;
pub mod xdp;

pub use fentry::{fentry_section, fexit_section, lsm_section, lsm_verdict, BtfResolver, TracingAttachType};
pub use flow_dissector::FlowDissectorVerdict;
pub use perf_iter::{iter_section, perf_event_section, IterVerdict};
pub use socket::{sk_lookup_section_name, sk_msg_section_name, sk_skb_section_name, socket_section_name, SkSkbHook, SockVerdict};
pub use struct_ops::CongestionCallback;
pub use tc::{TcAction, TcDirection};
pub use xdp::XdpAction;

/// Translates a human-written verdict keyword into the kernel's integer
/// encoding for each attach point's program type, so that a textual
/// assembler front-end (spec.md §4.8) can accept `pass`/`drop`/etc.
/// without hardcoding the numbering itself. Unknown keywords return
/// `None` rather than guessing.
pub fn verdict_keyword(program_type: &str, keyword: &str) -> Option<i32> {
    let v = match (program_type, keyword) {
        ("xdp", "aborted") => XdpAction::Aborted.as_i32(),
        ("xdp", "drop") => XdpAction::Drop.as_i32(),
        ("xdp", "pass") => XdpAction::Pass.as_i32(),
        ("xdp", "tx") => XdpAction::Tx.as_i32(),
        ("xdp", "redirect") => XdpAction::Redirect.as_i32(),

        ("tc", "unspec") => TcAction::Unspec.as_i32(),
        ("tc", "ok") => TcAction::Ok.as_i32(),
        ("tc", "reclassify") => TcAction::Reclassify.as_i32(),
        ("tc", "shot") => TcAction::Shot.as_i32(),
        ("tc", "pipe") => TcAction::Pipe.as_i32(),
        ("tc", "stolen") => TcAction::Stolen.as_i32(),
        ("tc", "queued") => TcAction::Queued.as_i32(),
        ("tc", "repeat") => TcAction::Repeat.as_i32(),
        ("tc", "redirect") => TcAction::Redirect.as_i32(),

        ("sk_lookup", "drop") | ("sk_skb", "drop") | ("sk_msg", "drop") => SockVerdict::Drop.as_i32(),
        ("sk_lookup", "pass") | ("sk_skb", "pass") | ("sk_msg", "pass") => SockVerdict::Pass.as_i32(),

        ("flow_dissector", "ok") => FlowDissectorVerdict::Ok.as_i32(),
        ("flow_dissector", "drop") => FlowDissectorVerdict::Drop.as_i32(),

        ("lsm", "allow") => lsm_verdict::ALLOW,
        ("lsm", "eperm") => lsm_verdict::EPERM,
        ("lsm", "enoent") => lsm_verdict::ENOENT,
        ("lsm", "eacces") => lsm_verdict::EACCES,
        ("lsm", "einval") => lsm_verdict::EINVAL,

        ("iter", "continue") => IterVerdict::Continue.as_i32(),
        ("iter", "stop") => IterVerdict::Stop.as_i32(),

        _ => return None,
    };
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_keywords_per_program_type() {
        assert_eq!(verdict_keyword("xdp", "drop"), Some(1));
        assert_eq!(verdict_keyword("tc", "shot"), Some(2));
        assert_eq!(verdict_keyword("sk_skb", "pass"), Some(1));
        assert_eq!(verdict_keyword("lsm", "eacces"), Some(-13));
        assert_eq!(verdict_keyword("iter", "stop"), Some(1));
    }

    #[test]
    fn unknown_keyword_or_program_type_is_none() {
        assert_eq!(verdict_keyword("xdp", "bogus"), None);
        assert_eq!(verdict_keyword("bogus", "drop"), None);
    }
}
