//! The flat compiled-program representation.
//!
//! A program is an ordered sequence of opcodes plus the load/store target
//! tables, the resolved jump table, and the symbol slots with their
//! initial values. The instruction stream is backend-independent; a
//! `Program<B>` pairs it with one backend and the slot initials encoded
//! for that backend.

use frm_core::{Complex, FuncId, JumpKind};

use crate::backend::MathBackend;

/// One opcode of the flat program.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Instr {
    /// Push the next load-table slot onto the stack.
    Lod,
    /// Copy top of stack into the next store-table slot (does not pop).
    Sto,
    /// End of statement: park the top value in the scratch slot and reset
    /// the stack cursors.
    Clr,
    /// End of the once-per-pixel initialization section.
    EndInit,
    /// Unconditional jump.
    Jump,
    /// Jump when the top-of-stack real part is zero.
    JumpOnFalse,
    /// Jump target; advances the jump cursor only.
    JumpLabel,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Pwr,
    Sqr,
    Mod,
    /// Legacy fixed-point modulus (releases up to 1826).
    ModOld,
    Abs,
    Conj,
    Flip,
    Real,
    Imag,
    Zero,
    One,
    Ident,
    Recip,
    Sin,
    Cos,
    CosXX,
    Sinh,
    Cosh,
    Tan,
    Tanh,
    CoTan,
    CoTanh,
    Log,
    Exp,
    Sqrt,
    ASin,
    ACos,
    ASinh,
    ACosh,
    ATan,
    ATanh,
    CAbs,
    Floor,
    Ceil,
    Trunc,
    Round,
    SRand,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Ne,
    And,
    Or,
}

impl Instr {
    /// Binary operators consume the top operand.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Instr::Add
                | Instr::Sub
                | Instr::Mul
                | Instr::Div
                | Instr::Pwr
                | Instr::Lt
                | Instr::Gt
                | Instr::Lte
                | Instr::Gte
                | Instr::Eq
                | Instr::Ne
                | Instr::And
                | Instr::Or
        )
    }

    /// Net operand-stack effect of this opcode.
    pub fn stack_effect(self) -> i32 {
        if self == Instr::Lod {
            1
        } else if self.is_binary() {
            -1
        } else {
            0
        }
    }

    /// The opcode implementing a builtin function.
    pub fn from_func(func: FuncId) -> Instr {
        match func {
            FuncId::Sin => Instr::Sin,
            FuncId::Sinh => Instr::Sinh,
            FuncId::Cos => Instr::Cos,
            FuncId::Cosh => Instr::Cosh,
            FuncId::Sqr => Instr::Sqr,
            FuncId::Log => Instr::Log,
            FuncId::Exp => Instr::Exp,
            FuncId::Abs => Instr::Abs,
            FuncId::Conj => Instr::Conj,
            FuncId::Real => Instr::Real,
            FuncId::Imag => Instr::Imag,
            FuncId::Flip => Instr::Flip,
            FuncId::Tan => Instr::Tan,
            FuncId::Tanh => Instr::Tanh,
            FuncId::CoTan => Instr::CoTan,
            FuncId::CoTanh => Instr::CoTanh,
            FuncId::CosXX => Instr::CosXX,
            FuncId::SRand => Instr::SRand,
            FuncId::ASin => Instr::ASin,
            FuncId::ASinh => Instr::ASinh,
            FuncId::ACos => Instr::ACos,
            FuncId::ACosh => Instr::ACosh,
            FuncId::ATan => Instr::ATan,
            FuncId::ATanh => Instr::ATanh,
            FuncId::Sqrt => Instr::Sqrt,
            FuncId::CAbs => Instr::CAbs,
            FuncId::Floor => Instr::Floor,
            FuncId::Ceil => Instr::Ceil,
            FuncId::Trunc => Instr::Trunc,
            FuncId::Round => Instr::Round,
        }
    }
}

/// A function selectable into one of the fn1..fn4 trig slots.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TrigFn {
    Sin,
    Cos,
    CosXX,
    Sinh,
    Cosh,
    Tan,
    Tanh,
    CoTan,
    CoTanh,
    Sqr,
    Log,
    Exp,
    Abs,
    Conj,
    Flip,
    Real,
    Imag,
    Zero,
    One,
    Ident,
    Recip,
    ASin,
    ASinh,
    ACos,
    ACosh,
    ATan,
    ATanh,
    Sqrt,
    CAbs,
    Floor,
    Ceil,
    Trunc,
    Round,
}

impl TrigFn {
    /// The default fn1..fn4 selection.
    pub const DEFAULT_SLOTS: [TrigFn; 4] = [TrigFn::Sin, TrigFn::Sqr, TrigFn::Sinh, TrigFn::Cosh];

    pub fn instr(self) -> Instr {
        match self {
            TrigFn::Sin => Instr::Sin,
            TrigFn::Cos => Instr::Cos,
            TrigFn::CosXX => Instr::CosXX,
            TrigFn::Sinh => Instr::Sinh,
            TrigFn::Cosh => Instr::Cosh,
            TrigFn::Tan => Instr::Tan,
            TrigFn::Tanh => Instr::Tanh,
            TrigFn::CoTan => Instr::CoTan,
            TrigFn::CoTanh => Instr::CoTanh,
            TrigFn::Sqr => Instr::Sqr,
            TrigFn::Log => Instr::Log,
            TrigFn::Exp => Instr::Exp,
            TrigFn::Abs => Instr::Abs,
            TrigFn::Conj => Instr::Conj,
            TrigFn::Flip => Instr::Flip,
            TrigFn::Real => Instr::Real,
            TrigFn::Imag => Instr::Imag,
            TrigFn::Zero => Instr::Zero,
            TrigFn::One => Instr::One,
            TrigFn::Ident => Instr::Ident,
            TrigFn::Recip => Instr::Recip,
            TrigFn::ASin => Instr::ASin,
            TrigFn::ASinh => Instr::ASinh,
            TrigFn::ACos => Instr::ACos,
            TrigFn::ACosh => Instr::ACosh,
            TrigFn::ATan => Instr::ATan,
            TrigFn::ATanh => Instr::ATanh,
            TrigFn::Sqrt => Instr::Sqrt,
            TrigFn::CAbs => Instr::CAbs,
            TrigFn::Floor => Instr::Floor,
            TrigFn::Ceil => Instr::Ceil,
            TrigFn::Trunc => Instr::Trunc,
            TrigFn::Round => Instr::Round,
        }
    }
}

/// Plane-inversion settings supplied by the renderer.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Inversion {
    pub radius: f64,
    pub center: Complex,
}

impl Inversion {
    /// Invert a pixel coordinate about the circle.
    pub fn apply(&self, pixel: Complex) -> Complex {
        let mut z = pixel - self.center;
        let mut t = z.mod_squared();
        if t.abs() > f32::MIN_POSITIVE as f64 {
            t = self.radius / t;
        } else {
            t = f32::MAX as f64;
        }
        z.re *= t;
        z.im *= t;
        z + self.center
    }
}

/// Which optional inputs a compiled formula actually references.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FormulaFlags {
    pub uses_p1: bool,
    pub uses_p2: bool,
    pub uses_p3: bool,
    pub uses_p4: bool,
    pub uses_p5: bool,
    pub uses_ismand: bool,
    pub uses_jump: bool,
    pub uses_rand: bool,
    /// Highest fn1..fn4 slot referenced (0 when none).
    pub max_fn: u8,
    /// Set when a fixed-point formula reads a value that only exists at
    /// float precision (scrnpix, scrnmax, maxit).
    pub needs_float: bool,
}

/// One symbol slot: a predefined or user variable, or a literal constant.
#[derive(Clone, PartialEq, Debug)]
pub struct SlotDef {
    pub name: String,
    pub init: Complex,
}

/// A resolved jump: the cursor snapshot of its destination and the jump
/// cursor to resume at when the jump is taken.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct JumpRecord {
    pub kind: JumpKind,
    pub dest_op: usize,
    pub dest_lod: usize,
    pub dest_sto: usize,
    pub dest_jump: usize,
}

/// The backend-independent compiled program.
#[derive(Clone, Debug)]
pub struct ProgramData {
    pub instrs: Box<[Instr]>,
    /// Slot index per Lod opcode, in execution-cursor order.
    pub loads: Box<[u32]>,
    /// Slot index per Sto opcode, in execution-cursor order.
    pub stores: Box<[u32]>,
    pub jumps: Box<[JumpRecord]>,
    pub slots: Box<[SlotDef]>,
    /// True when the formula has a `:` initialization separator.
    pub has_init_section: bool,
    pub inversion: Option<Inversion>,
    pub flags: FormulaFlags,
}

impl ProgramData {
    /// Find a slot by its normalized name (tests and tooling).
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }
}

/// A program bound to one numeric backend, with slot initials encoded.
#[derive(Clone, Debug)]
pub struct Program<B: MathBackend> {
    backend: B,
    data: ProgramData,
    init_values: Vec<B::Num>,
}

impl<B: MathBackend> Program<B> {
    pub fn new(data: ProgramData, backend: B) -> Self {
        let init_values = data.slots.iter().map(|s| backend.encode(s.init)).collect();
        Self {
            backend,
            data,
            init_values,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn data(&self) -> &ProgramData {
        &self.data
    }

    pub fn initial_values(&self) -> &[B::Num] {
        &self.init_values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_effects() {
        assert_eq!(Instr::Lod.stack_effect(), 1);
        assert_eq!(Instr::Add.stack_effect(), -1);
        assert_eq!(Instr::Sin.stack_effect(), 0);
        assert_eq!(Instr::Sto.stack_effect(), 0); // store does not pop
    }

    #[test]
    fn trig_slot_defaults() {
        let instrs: Vec<Instr> = TrigFn::DEFAULT_SLOTS.iter().map(|t| t.instr()).collect();
        assert_eq!(
            instrs,
            vec![Instr::Sin, Instr::Sqr, Instr::Sinh, Instr::Cosh]
        );
    }

    #[test]
    fn inversion_is_involutive_on_radius() {
        // a point on the inversion circle maps to itself
        let inv = Inversion {
            radius: 4.0,
            center: Complex::ZERO,
        };
        let z = Complex::new(2.0, 0.0); // |z|^2 == radius
        let w = inv.apply(z);
        assert!((w.re - 2.0).abs() < 1e-12 && w.im.abs() < 1e-12);
    }

    #[test]
    fn inversion_guards_center() {
        let inv = Inversion {
            radius: 1.0,
            center: Complex::ZERO,
        };
        let w = inv.apply(Complex::ZERO);
        assert!(w.re.is_finite() && w.im.is_finite());
    }
}
