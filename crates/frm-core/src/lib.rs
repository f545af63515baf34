//! Core types for the formula language.
//!
//! This crate provides foundational types used throughout the formula
//! compiler and virtual machine:
//! - Source positions and spans
//! - Complex number pairs
//! - The token model
//! - Error codes and compile-error records

pub mod complex;
pub mod error;
pub mod span;
pub mod token;

// Re-export commonly used types at crate root
pub use complex::Complex;
pub use error::{CompileErrors, ErrorCode, ErrorRecord, MAX_COMPILE_ERRORS};
pub use span::{Pos, Span};
pub use token::{
    FuncId, JumpKind, LexErrorKind, OpId, ParenKind, PredefVar, Token, TokenKind,
};
