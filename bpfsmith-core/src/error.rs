use thiserror::Error;

/// Errors raised while constructing a single instruction. Pure and
/// deterministic; never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("invalid register value {0} (must be 0..=10)")]
    InvalidRegister(u8),
    #[error("invalid operand size {0} bytes (must be 1, 2, 4, or 8)")]
    InvalidSize(u8),
    #[error("unknown field or register name `{0}`")]
    UnknownField(String),
    #[error("unknown helper `{0}`")]
    UnknownHelper(String),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("offset {0} does not fit in a signed 16-bit displacement")]
    OffsetOutOfRange(i64),
    #[error("immediate {0} does not fit in a signed 32-bit field")]
    ImmediateOutOfRange(i64),
}

/// Errors raised by the two-pass assembler while resolving labels and
/// emitting bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("reference to unknown label `{0}`")]
    UnknownLabel(String),
    #[error("resolved jump offset {0} for label `{1}` does not fit in i16")]
    OffsetOutOfRange(i64, String),
    #[error("label `{0}` resolves into the second slot of a wide-immediate pair")]
    MisalignedLddw(String),
}
