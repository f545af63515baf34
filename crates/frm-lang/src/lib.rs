//! The formula language engine.
//!
//! This crate provides the compilation half of the fractal formula
//! system:
//! - `lexer` - one token per call over formula text
//! - `entry` - formula-file entries and header validation
//! - `prescan` - full validation and sizing pass
//! - `compile` - preparation, the precedence compiler, the jump resolver
//!   and the two-pass allocator
//! - `report` - formatted error reporting with caret underlines
//! - `formula` - the compile/run facade over the VM crate

pub mod compile;
pub mod entry;
pub mod formula;
pub mod lexer;
pub mod prescan;
pub mod report;

// Re-export commonly used types at crate root
pub use compile::{compile_body, compile_prepared, prepare, Capacities, ParserConfig};
pub use entry::{check_header, find_entry, EntryHeader, Symmetry};
pub use formula::{CompileEnv, Evaluator, Formula, FormulaError, MathType};
pub use lexer::Lexer;
pub use prescan::{prescan, Prescan, MAX_JUMPS, MAX_PARENS};

// Re-export VM types from frm-vm for convenience
pub use frm_vm::{
    Compatibility, FormulaFlags, Instr, Inversion, LegacyRng, MathBackend, PixelInput, TrigFn,
};
pub use frm_core::{Complex, ErrorCode, ErrorRecord};
