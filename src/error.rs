//! Crate-wide error type for the evaluation core.
//!
//! Unlike the loose `anyhow::Result` used at the edges (the CLI harness,
//! `Context`-annotated glue), the core itself raises a concrete, matchable
//! error so that callers can recover from e.g. [`EvalError::UnknownMember`]
//! when probing whether a member exists before committing to it.

use std::fmt;

/// A single kind of evaluation failure, one per row of the error table.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operands incompatible with the requested operation.
    TypeMismatch { message: String },
    /// A struct/union lacks the named member.
    UnknownMember { type_name: String, member: String },
    /// Size/alignment required of an incomplete type.
    IncompleteType { type_name: String },
    /// Iterating or taking the length of an unknown-length array or pointer.
    UnboundedIteration,
    /// The reader cannot satisfy a byte range.
    AddressNotMapped { address: u64, length: u64 },
    /// `read_c_string` exhausted `max_len` without finding a NUL.
    UnterminatedString { address: u64, max_len: u64 },
    /// Integer `/` or `%` with a zero divisor.
    DivideByZero,
    /// An object was constructed with both address and value, or neither
    /// where exactly one is required.
    InvalidConstruction { message: String },
    /// `address_of_()` on a value object.
    NoAddress,
    /// The symbol resolver returned nothing for a name.
    SymbolNotFound { name: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { message } => write!(f, "type mismatch: {message}"),
            Self::UnknownMember { type_name, member } => {
                write!(f, "{type_name} has no member named '{member}'")
            }
            Self::IncompleteType { type_name } => {
                write!(f, "'{type_name}' is an incomplete type")
            }
            Self::UnboundedIteration => {
                write!(f, "cannot iterate or take the length of an unbounded object")
            }
            Self::AddressNotMapped { address, length } => write!(
                f,
                "address range [{address:#x}, {:#x}) is not mapped",
                address.wrapping_add(*length)
            ),
            Self::UnterminatedString { address, max_len } => write!(
                f,
                "no NUL terminator found within {max_len} bytes starting at {address:#x}"
            ),
            Self::DivideByZero => write!(f, "division by zero"),
            Self::InvalidConstruction { message } => {
                write!(f, "invalid object construction: {message}")
            }
            Self::NoAddress => write!(f, "object has no address"),
            Self::SymbolNotFound { name } => write!(f, "symbol '{name}' not found"),
        }
    }
}

impl std::error::Error for EvalError {}

pub type Result<T> = std::result::Result<T, EvalError>;
