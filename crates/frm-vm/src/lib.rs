//! The formula virtual machine.
//!
//! This crate provides the evaluation half of the formula engine:
//! - `cmath` - complex transcendental library shared by the backends
//! - `backend` - the `MathBackend` trait and compatibility switches
//! - `float` / `fixed` / `big` - the three numeric backends
//! - `rng` - the legacy seedable random-number generator
//! - `program` - the flat compiled-program representation
//! - `vm` - the stack machine executing a program per pixel and per
//!   iteration

pub mod backend;
pub mod big;
pub mod cmath;
pub mod fixed;
pub mod float;
pub mod program;
pub mod rng;
pub mod vm;

// Re-export commonly used types at crate root
pub use backend::{Compatibility, MathBackend};
pub use big::{BigBackend, BigComplex};
pub use fixed::{FixedBackend, FixedComplex};
pub use float::FloatBackend;
pub use program::{
    FormulaFlags, Instr, Inversion, JumpRecord, Program, ProgramData, SlotDef, TrigFn,
};
pub use rng::LegacyRng;
pub use vm::{PixelInput, Vm, OPERAND_STACK};
