//! Shared shape every program-type DSL reuses (spec.md §4.5 "common
//! shape"): prologue/epilogue conventions and the canonical bounds-check
//! template packet-processing DSLs need for verifier acceptance.

use bpfsmith_core::{ops, ConstructionError, Item, IntoReg, JumpTarget};

/// Saves `r1` (the context pointer) into `ctx_reg`. A no-op when the
/// caller already builds directly on `r1`.
pub fn save_context(ctx_reg: impl IntoReg + Copy) -> Result<Vec<Item>, ConstructionError> {
    let reg = ctx_reg.into_reg()?;
    if reg.as_u8() == bpfsmith_core::Reg::R1.as_u8() {
        return Ok(Vec::new());
    }
    Ok(vec![ops::mov_reg(reg, bpfsmith_core::Reg::R1)?])
}

/// Loads a context-struct field at `offset` (4 or 8 bytes) into `dst`.
pub fn load_ctx_field(
    dst: impl IntoReg,
    ctx_reg: impl IntoReg,
    offset: i16,
    n_bytes: u8,
) -> Result<Item, ConstructionError> {
    ops::ldx(dst, ctx_reg, offset, n_bytes)
}

/// The canonical three-instruction bounds-check shape: `tmp := base +
/// n; if tmp > limit goto fail`. `fail` is a jump target reached when
/// the access would run past `limit`; the caller supplies it as either
/// a concrete offset or a label to resolve later.
pub fn bounds_check(
    tmp: impl IntoReg + Copy,
    base: impl IntoReg,
    n: i32,
    limit: impl IntoReg,
    fail: impl Into<JumpTarget>,
) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![
        ops::mov_reg(tmp, base)?,
        ops::add64(tmp, n)?,
        ops::jgt_reg(tmp, limit, fail)?,
    ])
}

/// Epilogue: loads the verdict into `r0`, then `exit`.
pub fn epilogue(verdict: i32) -> Result<Vec<Item>, ConstructionError> {
    Ok(vec![ops::mov(bpfsmith_core::Reg::R0, verdict)?, ops::exit()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfsmith_core::Reg;

    #[test]
    fn save_context_is_a_no_op_when_already_in_r1() {
        assert!(save_context(Reg::R1).unwrap().is_empty());
    }

    #[test]
    fn save_context_emits_a_move_into_r1_otherwise() {
        let items = save_context(Reg::R6).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn bounds_check_emits_exactly_three_instructions() {
        let items = bounds_check(Reg::R2, Reg::R3, 8, Reg::R4, 5i16).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn epilogue_emits_mov_then_exit() {
        let items = epilogue(2).unwrap();
        assert_eq!(items.len(), 2);
    }
}
