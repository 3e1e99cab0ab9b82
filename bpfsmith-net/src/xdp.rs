//! XDP program DSL (spec.md §4.5): `xdp_md` context offsets, the verdict
//! enum, and builders for the Ethernet/IPv4 parsing a typical XDP
//! program needs before it decides a verdict.

use bpfsmith_core::{ops, ConstructionError, Item, IntoReg, JumpTarget, Reg};

use crate::common;

/// `xdp_md` field offsets (spec.md §4.5).
pub mod xdp_md_offsets {
    pub const DATA: i16 = 0;
    pub const DATA_END: i16 = 4;
    pub const DATA_META: i16 = 8;
    pub const INGRESS_IFINDEX: i16 = 12;
    pub const RX_QUEUE_INDEX: i16 = 16;
    pub const EGRESS_IFINDEX: i16 = 20;
}

/// XDP verdicts, bit-exact with the kernel enumeration (spec.md §4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum XdpAction {
    Aborted = 0,
    Drop = 1,
    Pass = 2,
    Tx = 3,
    Redirect = 4,
}

impl XdpAction {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// `"xdp"` or `"xdp/<name>"`.
pub fn section_name(name: Option<&str>) -> String {
    match name {
        Some(n) => format!("xdp/{n}"),
        None => "xdp".to_string(),
    }
}

/// A thin façade over the instruction encoder for XDP programs: fixes
/// which registers hold the context, `data`, and `data_end` pointers,
/// and provides the prologue/epilogue/bounds-check shapes the verifier
/// expects (spec.md §4.5 "common shape").
pub struct XdpProgramBuilder {
    ctx_reg: Reg,
    data_reg: Reg,
    data_end_reg: Reg,
    default_action: XdpAction,
}

impl XdpProgramBuilder {
    pub fn new(
        ctx_reg: impl IntoReg,
        data_reg: impl IntoReg,
        data_end_reg: impl IntoReg,
        default_action: XdpAction,
    ) -> Result<Self, ConstructionError> {
        Ok(Self {
            ctx_reg: ctx_reg.into_reg()?,
            data_reg: data_reg.into_reg()?,
            data_end_reg: data_end_reg.into_reg()?,
            default_action,
        })
    }

    fn prologue(&self) -> Result<Vec<Item>, ConstructionError> {
        let mut items = common::save_context(self.ctx_reg)?;
        items.push(common::load_ctx_field(self.data_reg, self.ctx_reg, xdp_md_offsets::DATA, 4)?);
        items.push(common::load_ctx_field(self.data_end_reg, self.ctx_reg, xdp_md_offsets::DATA_END, 4)?);
        Ok(items)
    }

    /// Wraps `body` in the prologue and an epilogue that falls through
    /// to `default_action` (the body is responsible for its own early
    /// exits, e.g. via a bounds-check failure jumping past it).
    pub fn build(&self, body: Vec<Item>) -> Result<Vec<Item>, ConstructionError> {
        let mut items = self.prologue()?;
        items.extend(body);
        items.extend(common::epilogue(self.default_action.as_i32())?);
        Ok(items)
    }

    /// The canonical bounds-check: `tmp := data + n; if tmp > data_end
    /// goto fail`.
    pub fn bounds_check(
        &self,
        tmp: impl IntoReg + Copy,
        n: i32,
        fail: impl Into<JumpTarget>,
    ) -> Result<Vec<Item>, ConstructionError> {
        common::bounds_check(tmp, self.data_reg, n, self.data_end_reg, fail)
    }

    pub fn data_reg(&self) -> Reg {
        self.data_reg
    }

    pub fn data_end_reg(&self) -> Reg {
        self.data_end_reg
    }
}

/// Loads the 16-bit EtherType field (offset 12 in a 14-byte Ethernet
/// header) into `dst`, big-endian on the wire.
pub fn load_ethertype(dst: impl IntoReg, data_reg: impl IntoReg) -> Result<Item, ConstructionError> {
    ops::ldx(dst, data_reg, 12, 2)
}

/// `bpf_xdp_adjust_head(ctx, delta)`. `ctx_reg` must already hold the
/// program's context pointer; the caller places it in `r1` beforehand
/// if it lives elsewhere (see [`common::save_context`]).
pub fn adjust_head(ctx_reg: impl IntoReg, delta: i32) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::mov_reg(Reg::R1, ctx_reg)?,
        ops::mov(Reg::R2, delta)?,
        ops::call(bpfsmith_core::Helper::XdpAdjustHead.id()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_values_match_spec_table() {
        assert_eq!(XdpAction::Aborted.as_i32(), 0);
        assert_eq!(XdpAction::Drop.as_i32(), 1);
        assert_eq!(XdpAction::Pass.as_i32(), 2);
        assert_eq!(XdpAction::Tx.as_i32(), 3);
        assert_eq!(XdpAction::Redirect.as_i32(), 4);
    }

    #[test]
    fn section_names() {
        assert_eq!(section_name(None), "xdp");
        assert_eq!(section_name(Some("drop_all")), "xdp/drop_all");
    }

    #[test]
    fn build_wraps_prologue_and_epilogue_around_the_body() {
        let builder = XdpProgramBuilder::new("r1", "r2", "r3", XdpAction::Pass).unwrap();
        let program = builder.build(vec![]).unwrap();
        let bytes = bpfsmith_core::assemble(program).unwrap();
        // prologue: mov r2,r1 skipped (ctx_reg is r1); two ldx loads (16 bytes);
        // epilogue: mov r0, 2; exit (16 bytes) -> 32 bytes total here since
        // ctx_reg == r1 elides the save.
        assert_eq!(bytes.len(), 32);
    }
}
