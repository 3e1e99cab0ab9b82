use crate::error::ConstructionError;

/// One of the eleven BPF registers.
///
/// `R10` is the read-only frame pointer. `R0` carries return values and is
/// clobbered by `call`. `R1..=R5` pass call arguments; `R6..=R9` are
/// callee-saved across `call`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
}

impl Reg {
    pub const FP: Reg = Reg::R10;

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Result<Self, ConstructionError> {
        match v {
            0 => Ok(Reg::R0),
            1 => Ok(Reg::R1),
            2 => Ok(Reg::R2),
            3 => Ok(Reg::R3),
            4 => Ok(Reg::R4),
            5 => Ok(Reg::R5),
            6 => Ok(Reg::R6),
            7 => Ok(Reg::R7),
            8 => Ok(Reg::R8),
            9 => Ok(Reg::R9),
            10 => Ok(Reg::R10),
            other => Err(ConstructionError::InvalidRegister(other)),
        }
    }
}

/// Anything that can be coerced into a register: a `Reg` value, a raw
/// integer in `0..=10`, or a symbolic lowercase name (`"r3"`, `"fp"`).
pub trait IntoReg {
    fn into_reg(self) -> Result<Reg, ConstructionError>;
}

impl IntoReg for Reg {
    fn into_reg(self) -> Result<Reg, ConstructionError> {
        Ok(self)
    }
}

impl IntoReg for u8 {
    fn into_reg(self) -> Result<Reg, ConstructionError> {
        Reg::from_u8(self)
    }
}

impl IntoReg for i32 {
    fn into_reg(self) -> Result<Reg, ConstructionError> {
        u8::try_from(self)
            .map_err(|_| ConstructionError::InvalidRegister(0xFF))
            .and_then(Reg::from_u8)
    }
}

impl IntoReg for &str {
    fn into_reg(self) -> Result<Reg, ConstructionError> {
        match self {
            "r0" => Ok(Reg::R0),
            "r1" => Ok(Reg::R1),
            "r2" => Ok(Reg::R2),
            "r3" => Ok(Reg::R3),
            "r4" => Ok(Reg::R4),
            "r5" => Ok(Reg::R5),
            "r6" => Ok(Reg::R6),
            "r7" => Ok(Reg::R7),
            "r8" => Ok(Reg::R8),
            "r9" => Ok(Reg::R9),
            "r10" | "fp" => Ok(Reg::R10),
            _ => Err(ConstructionError::UnknownField(self.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_integer_and_symbolic_forms() {
        assert_eq!(3u8.into_reg().unwrap(), Reg::R3);
        assert_eq!("fp".into_reg().unwrap(), Reg::R10);
        assert_eq!("r10".into_reg().unwrap(), Reg::R10);
    }

    #[test]
    fn rejects_out_of_range_register() {
        assert!(matches!(
            11u8.into_reg(),
            Err(ConstructionError::InvalidRegister(11))
        ));
    }
}
