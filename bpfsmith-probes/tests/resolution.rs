use bpfsmith_probes::{tracepoint_section, Arch, TracepointCache};

#[test]
fn tracepoint_section_naming_matches_spec_shape() {
    assert_eq!(tracepoint_section("syscalls", "sys_enter_execve"), "tracepoint/syscalls/sys_enter_execve");
}

#[test]
fn fallback_table_resolves_without_a_live_tracefs_mount() {
    let cache = TracepointCache::with_root("/definitely/not/a/tracefs/mount");
    let d = cache.get("raw_syscalls", "sys_enter").unwrap();
    assert!(d.field("id").is_some());
    let _ = Arch::X86_64;
}
