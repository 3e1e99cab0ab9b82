use bpfsmith_net::{
    fentry::lsm_verdict,
    flow_dissector::FlowDissectorVerdict,
    perf_iter::IterVerdict,
    socket::SockVerdict,
    tc::TcAction,
    verdict_keyword,
    xdp::XdpAction,
};

/// Every verdict enumeration must be bit-exact with the kernel's own
/// numbering (spec.md §8, testable property 4) -- checked both via the
/// enums directly and via the keyword translator every DSL shares.
#[test]
fn xdp_verdicts_are_bit_exact() {
    let table = [
        (XdpAction::Aborted, 0),
        (XdpAction::Drop, 1),
        (XdpAction::Pass, 2),
        (XdpAction::Tx, 3),
        (XdpAction::Redirect, 4),
    ];
    for (action, expected) in table {
        assert_eq!(action.as_i32(), expected);
    }
    assert_eq!(verdict_keyword("xdp", "aborted"), Some(0));
    assert_eq!(verdict_keyword("xdp", "redirect"), Some(4));
}

#[test]
fn tc_verdicts_are_bit_exact() {
    let table = [
        (TcAction::Unspec, -1),
        (TcAction::Ok, 0),
        (TcAction::Reclassify, 1),
        (TcAction::Shot, 2),
        (TcAction::Pipe, 3),
        (TcAction::Stolen, 4),
        (TcAction::Queued, 5),
        (TcAction::Repeat, 6),
        (TcAction::Redirect, 7),
    ];
    for (action, expected) in table {
        assert_eq!(action.as_i32(), expected);
    }
    assert_eq!(verdict_keyword("tc", "unspec"), Some(-1));
}

#[test]
fn socket_family_verdicts_are_bit_exact() {
    assert_eq!(SockVerdict::Drop.as_i32(), 0);
    assert_eq!(SockVerdict::Pass.as_i32(), 1);
    for program_type in ["sk_lookup", "sk_skb", "sk_msg"] {
        assert_eq!(verdict_keyword(program_type, "drop"), Some(0));
        assert_eq!(verdict_keyword(program_type, "pass"), Some(1));
    }
}

#[test]
fn flow_dissector_verdicts_are_bit_exact() {
    assert_eq!(FlowDissectorVerdict::Ok.as_i32(), 0);
    assert_eq!(FlowDissectorVerdict::Drop.as_i32(), -1);
}

#[test]
fn lsm_verdicts_follow_the_errno_convention() {
    assert_eq!(lsm_verdict::ALLOW, 0);
    assert_eq!(lsm_verdict::EPERM, -1);
    assert_eq!(lsm_verdict::ENOENT, -2);
    assert_eq!(lsm_verdict::EACCES, -13);
    assert_eq!(lsm_verdict::EINVAL, -22);
}

#[test]
fn iter_verdicts_are_bit_exact() {
    assert_eq!(IterVerdict::Continue.as_i32(), 0);
    assert_eq!(IterVerdict::Stop.as_i32(), 1);
}
