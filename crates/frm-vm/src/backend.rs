//! The numeric-backend abstraction.
//!
//! A backend supplies one concrete representation of a complex value and
//! the full primitive set the compiled opcodes need. The backend is chosen
//! once per compiled program; the VM never branches on the math type per
//! instruction.

use frm_core::Complex;

/// Legacy-compatibility switches, keyed on the stored release number of
/// the formula's originating version.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Compatibility {
    pub release: u16,
}

impl Compatibility {
    pub const CURRENT: Compatibility = Compatibility { release: 2004 };

    /// Releases after 1920 latch the overflow flag on a vanishing
    /// denominator; earlier ones silently skip the operation.
    pub fn flags_denominator_overflow(self) -> bool {
        self.release > 1920
    }

    /// Releases up to 1826 computed the fixed-point modulus from the wrong
    /// stack operand.
    pub fn old_fixed_modulus(self) -> bool {
        self.release <= 1826
    }

    /// Releases before 1900 took `log(0)` inside `0^y` instead of
    /// returning zero.
    pub fn old_complex_power(self) -> bool {
        self.release < 1900
    }
}

impl Default for Compatibility {
    fn default() -> Self {
        Compatibility::CURRENT
    }
}

/// One numeric representation plus its primitive operations.
///
/// Binary operations write their result into `a` (the operand below the
/// top of stack) and the VM retracts the cursor; unary operations mutate
/// in place. Operations that can fail numerically latch `overflow`
/// instead of returning errors, matching the evaluation model the
/// renderer expects.
pub trait MathBackend {
    type Num: Clone + std::fmt::Debug;

    // conversions
    fn encode(&self, z: Complex) -> Self::Num;
    fn decode(&self, v: &Self::Num) -> Complex;

    /// The fudge shift shared with the random-number stream.
    fn bitshift(&self) -> u32;

    /// Encode an inverted pixel; the fixed backend clamps far-out points
    /// so they bail in one iteration.
    fn encode_inverted(&self, z: Complex) -> Self::Num {
        self.encode(z)
    }

    /// Fixed-point bit pattern, used for `srand` seeding.
    fn to_fixed(&self, v: &Self::Num) -> (i64, i64);

    /// Value from a fixed-point random pair.
    fn from_fixed(&self, x: i64, y: i64) -> Self::Num;

    /// Nonzero real part (jump tests).
    fn is_true(&self, v: &Self::Num) -> bool;

    /// Per-iteration bailout verdict from the top-of-stack value.
    fn bails_out(&self, v: &Self::Num, overflow: bool) -> bool;

    // unary
    fn neg(&self, v: &mut Self::Num);
    fn conj(&self, v: &mut Self::Num);
    fn abs(&self, v: &mut Self::Num);
    fn flip(&self, v: &mut Self::Num);
    fn real(&self, v: &mut Self::Num);
    fn imag(&self, v: &mut Self::Num);
    fn zero(&self, v: &mut Self::Num);
    fn one(&self, v: &mut Self::Num);
    fn ident(&self, _v: &mut Self::Num) {}
    fn recip(&self, v: &mut Self::Num, overflow: &mut bool);

    /// Square in place; returns the new `LastSqr` value (the squared
    /// modulus as a real).
    fn sqr(&self, v: &mut Self::Num, overflow: &mut bool) -> Self::Num;

    /// `|z|` — squared modulus onto the real axis.
    fn mod_squared(&self, v: &mut Self::Num, overflow: &mut bool);

    /// Legacy modulus: releases up to 1826 read the operand below the top
    /// of stack. Only meaningful on the fixed backend; the default falls
    /// back to the correct form.
    fn mod_squared_old(&self, v: &mut Self::Num, _below: &Self::Num, overflow: &mut bool) {
        self.mod_squared(v, overflow);
    }

    fn floor(&self, v: &mut Self::Num);
    fn ceil(&self, v: &mut Self::Num);
    fn trunc(&self, v: &mut Self::Num);
    fn round(&self, v: &mut Self::Num);

    fn sin(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cos(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cosxx(&self, v: &mut Self::Num, overflow: &mut bool);
    fn sinh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cosh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn tan(&self, v: &mut Self::Num, overflow: &mut bool);
    fn tanh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cotan(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cotanh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn log(&self, v: &mut Self::Num, overflow: &mut bool);
    fn exp(&self, v: &mut Self::Num, overflow: &mut bool);
    fn sqrt(&self, v: &mut Self::Num, overflow: &mut bool);
    fn asin(&self, v: &mut Self::Num, overflow: &mut bool);
    fn acos(&self, v: &mut Self::Num, overflow: &mut bool);
    fn asinh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn acosh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn atan(&self, v: &mut Self::Num, overflow: &mut bool);
    fn atanh(&self, v: &mut Self::Num, overflow: &mut bool);
    fn cabs(&self, v: &mut Self::Num, overflow: &mut bool);

    // binary: a = a op b
    fn add(&self, a: &mut Self::Num, b: &Self::Num);
    fn sub(&self, a: &mut Self::Num, b: &Self::Num);
    fn mul(&self, a: &mut Self::Num, b: &Self::Num, overflow: &mut bool);
    fn div(&self, a: &mut Self::Num, b: &Self::Num, overflow: &mut bool);
    fn pwr(&self, a: &mut Self::Num, b: &Self::Num, overflow: &mut bool);

    // comparisons and logic: real-part semantics, result is 1 or 0 on the
    // real axis
    fn lt(&self, a: &mut Self::Num, b: &Self::Num);
    fn gt(&self, a: &mut Self::Num, b: &Self::Num);
    fn lte(&self, a: &mut Self::Num, b: &Self::Num);
    fn gte(&self, a: &mut Self::Num, b: &Self::Num);
    fn eq(&self, a: &mut Self::Num, b: &Self::Num);
    fn ne(&self, a: &mut Self::Num, b: &Self::Num);
    fn and(&self, a: &mut Self::Num, b: &Self::Num);
    fn or(&self, a: &mut Self::Num, b: &Self::Num);
}
