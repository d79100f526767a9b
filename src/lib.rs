#![forbid(unsafe_code)]
//! Typed-object evaluation core for a post-mortem memory-image debugger.
//!
//! Given a read-only byte image (an ELF core dump, or any flat mapping
//! with the same segment shape) plus a catalogue of C types and a
//! symbol resolver, this crate lets a caller construct [`ProgramObject`]s
//! - typed views over either an address in the image or a synthesized
//! value - and apply C-semantics operations to them: member access,
//! pointer dereference, indexing, casts, arithmetic, bitwise/shift
//! operations, string extraction, and C-syntax rendering.
//!
//! The three load-bearing pieces are [`reader::CoreReader`] (bytes by
//! address), [`types::TypeCatalogue`] (the C type system), and
//! [`object::ProgramObject`] (the evaluator). [`program::Program`] ties
//! them together as the facade a client actually holds.

pub mod error;
pub mod object;
pub mod program;
pub mod reader;
pub mod render;
pub mod types;

pub use error::{EvalError, Result};
pub use object::{ArithOp, BitOp, CmpOp, ProgramObject, Value};
pub use program::{container_of, ByteOrder, Program};
pub use reader::{CoreReader, Segment};
pub use types::{Type, TypeCatalogue};
