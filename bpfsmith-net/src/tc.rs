//! TC (classifier/action) program DSL: `__sk_buff` context offsets and
//! the classifier verdict enumeration (spec.md §4.5).

use bpfsmith_core::{ops, ConstructionError, Item, IntoReg, JumpTarget, Reg};

use crate::common;

/// `__sk_buff` field offsets actually used by a typical TC classifier
/// (spec.md §4.5).
pub mod sk_buff_offsets {
    pub const LEN: i16 = 0;
    pub const PROTOCOL: i16 = 16;
    pub const IFINDEX: i16 = 40;
    pub const DATA: i16 = 76;
    pub const DATA_END: i16 = 80;
}

/// TC classifier verdicts, bit-exact with `net/sched/cls_bpf.c`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum TcAction {
    Unspec = -1,
    Ok = 0,
    Reclassify = 1,
    Shot = 2,
    Pipe = 3,
    Stolen = 4,
    Queued = 5,
    Repeat = 6,
    Redirect = 7,
}

impl TcAction {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// TC classifiers attach at a fixed section name, `tc/ingress` or
/// `tc/egress` depending on direction (spec.md §4.5); both directions
/// share one program type so callers pick the section explicitly.
pub fn section_name(direction: TcDirection) -> &'static str {
    match direction {
        TcDirection::Ingress => "tc/ingress",
        TcDirection::Egress => "tc/egress",
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TcDirection {
    Ingress,
    Egress,
}

/// A façade over the instruction encoder for TC classifiers, mirroring
/// [`crate::xdp::XdpProgramBuilder`]'s shape.
pub struct TcProgramBuilder {
    ctx_reg: Reg,
    data_reg: Reg,
    data_end_reg: Reg,
    default_action: TcAction,
}

impl TcProgramBuilder {
    pub fn new(
        ctx_reg: impl IntoReg,
        data_reg: impl IntoReg,
        data_end_reg: impl IntoReg,
        default_action: TcAction,
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
        items.push(common::load_ctx_field(self.data_reg, self.ctx_reg, sk_buff_offsets::DATA, 8)?);
        items.push(common::load_ctx_field(self.data_end_reg, self.ctx_reg, sk_buff_offsets::DATA_END, 8)?);
        Ok(items)
    }

    pub fn build(&self, body: Vec<Item>) -> Result<Vec<Item>, ConstructionError> {
        let mut items = self.prologue()?;
        items.extend(body);
        items.extend(common::epilogue(self.default_action.as_i32())?);
        Ok(items)
    }

    pub fn bounds_check(
        &self,
        tmp: impl IntoReg + Copy,
        n: i32,
        fail: impl Into<JumpTarget>,
    ) -> Result<Vec<Item>, ConstructionError> {
        common::bounds_check(tmp, self.data_reg, n, self.data_end_reg, fail)
    }
}

/// `bpf_skb_load_bytes(skb, offset, dst_buf_ptr, len)`.
pub fn skb_load_bytes(
    ctx_reg: impl IntoReg,
    offset: i32,
    buf_reg: impl IntoReg,
    len: i32,
) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::mov_reg(Reg::R1, ctx_reg)?,
        ops::mov(Reg::R2, offset)?,
        ops::mov_reg(Reg::R3, buf_reg)?,
        ops::mov(Reg::R4, len)?,
        ops::call(bpfsmith_core::Helper::SkbLoadBytes.id()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_values_match_spec_table() {
        assert_eq!(TcAction::Unspec.as_i32(), -1);
        assert_eq!(TcAction::Ok.as_i32(), 0);
        assert_eq!(TcAction::Reclassify.as_i32(), 1);
        assert_eq!(TcAction::Shot.as_i32(), 2);
        assert_eq!(TcAction::Pipe.as_i32(), 3);
        assert_eq!(TcAction::Stolen.as_i32(), 4);
        assert_eq!(TcAction::Queued.as_i32(), 5);
        assert_eq!(TcAction::Repeat.as_i32(), 6);
        assert_eq!(TcAction::Redirect.as_i32(), 7);
    }

    #[test]
    fn section_names() {
        assert_eq!(section_name(TcDirection::Ingress), "tc/ingress");
        assert_eq!(section_name(TcDirection::Egress), "tc/egress");
    }

    #[test]
    fn build_produces_a_well_formed_program() {
        let builder = TcProgramBuilder::new("r1", "r2", "r3", TcAction::Ok).unwrap();
        let program = builder.build(vec![]).unwrap();
        bpfsmith_core::assemble(program).unwrap();
    }
}
