//! Literal end-to-end scenarios from spec.md §8.

use bpfsmith_core::{assemble, ops, program, Item, Reg};

#[test]
fn scenario_a_xdp_drop_all() {
    let bytes = program("xdp", vec![ops::mov(Reg::R0, 1).unwrap(), ops::exit()]).unwrap();
    assert_eq!(
        bytes,
        vec![
            0xb7, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x95, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00
        ]
    );
}

#[test]
fn scenario_b_unconditional_forward_jump() {
    let prog: Vec<Item> = vec![
        ops::ja("lbl"),
        ops::mov(Reg::R0, 0).unwrap(),
        Item::Label("lbl".into()),
        ops::exit(),
    ];
    let bytes = assemble(prog).unwrap();
    assert_eq!(
        &bytes[0..8],
        &[0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(
        &bytes[16..24],
        &[0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn scenario_c_lddw_of_a_map_fd() {
    let bytes = assemble(vec![ops::ld_map_fd(Reg::R1, 7).unwrap()]).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(bytes[1], 0x10); // src=1 (pseudo MAP_FD), dst=1
    assert_eq!(&bytes[4..8], &[0x07, 0x00, 0x00, 0x00]);
    assert_eq!(&bytes[8..16], &[0u8; 8]);
}

#[test]
fn property_encoding_is_bit_exact_for_arbitrary_fields() {
    for (op, dst, src, off, imm) in [
        (0x07u8, 3u8, 0u8, 0i16, 42i32),
        (0xB7, 10, 0, -1, i32::MIN),
        (0x61, 0, 9, 32767, i32::MAX),
    ] {
        let insn = bpfsmith_core::Instruction::new(op, dst, src, off, imm).unwrap();
        let bytes = insn.to_bytes();
        assert_eq!(bytes[0], op);
        assert_eq!(bytes[1], ((src & 0x0f) << 4) | (dst & 0x0f));
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), off);
        assert_eq!(
            i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            imm
        );
        assert_eq!(bpfsmith_core::Instruction::from_bytes(bytes), insn);
    }
}

#[test]
fn property_two_pass_assembly_is_deterministic() {
    let build = || {
        vec![
            ops::ja("end"),
            ops::mov(Reg::R1, 1).unwrap(),
            Item::Label("end".into()),
            ops::exit(),
        ]
    };
    assert_eq!(assemble(build()).unwrap(), assemble(build()).unwrap());
}
