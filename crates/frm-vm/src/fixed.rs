//! Fixed-point backend: 32-bit-range integers scaled by a fudge shift.
//!
//! Adds, multiplies, squares, modulus and the comparisons run in pure
//! integer arithmetic with overflow latching. Transcendentals convert
//! through the shared floating-point library and re-check the magnitude on
//! the way back, bailing the pixel out on overflow.

use frm_core::Complex;

use crate::backend::{Compatibility, MathBackend};
use crate::cmath;

/// Largest representable fixed-point magnitude.
const FIXED_MAX: i64 = 0x7fff_ffff;

/// A complex value as a pair of fudged integers.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FixedComplex {
    pub x: i64,
    pub y: i64,
}

/// The fixed-point math type.
#[derive(Copy, Clone, Debug)]
pub struct FixedBackend {
    pub bitshift: u32,
    pub compat: Compatibility,
}

/// `(x*y) >> n` with saturation and overflow latching.
pub fn multiply(x: i64, y: i64, n: u32, overflow: &mut bool) -> i64 {
    let r = (x as i128 * y as i128) >> n;
    if r > FIXED_MAX as i128 || r < -(FIXED_MAX as i128) {
        *overflow = true;
        FIXED_MAX
    } else {
        r as i64
    }
}

/// `(x << n) / y` with saturation and overflow latching.
pub fn divide(x: i64, y: i64, n: u32, overflow: &mut bool) -> i64 {
    if y == 0 {
        *overflow = true;
        return FIXED_MAX;
    }
    let r = ((x as i128) << n) / y as i128;
    if r > FIXED_MAX as i128 || r < -(FIXED_MAX as i128) {
        *overflow = true;
        FIXED_MAX
    } else {
        r as i64
    }
}

impl FixedBackend {
    pub fn new(bitshift: u32, compat: Compatibility) -> Self {
        Self { bitshift, compat }
    }

    fn fudge(&self) -> f64 {
        (1i64 << self.bitshift) as f64
    }

    /// Largest double that still fits the fixed range after fudging.
    fn fg_limit(&self) -> f64 {
        FIXED_MAX as f64 / self.fudge()
    }

    /// Apply a float-library function, re-encoding with a range check.
    fn via_f64(
        &self,
        v: &mut FixedComplex,
        overflow: &mut bool,
        f: impl FnOnce(&mut Complex, Compatibility, &mut bool),
    ) {
        let mut z = self.decode(v);
        f(&mut z, self.compat, overflow);
        if z.re.abs() < self.fg_limit() && z.im.abs() < self.fg_limit() {
            *v = self.encode(z);
        } else {
            *overflow = true;
        }
    }

    fn bool_val(&self, b: bool) -> i64 {
        (b as i64) << self.bitshift
    }
}

impl MathBackend for FixedBackend {
    type Num = FixedComplex;

    fn encode(&self, z: Complex) -> FixedComplex {
        let fg = self.fudge();
        FixedComplex {
            x: (z.re * fg) as i64,
            y: (z.im * fg) as i64,
        }
    }

    fn decode(&self, v: &FixedComplex) -> Complex {
        let fg = self.fudge();
        Complex::new(v.x as f64 / fg, v.y as f64 / fg)
    }

    fn bitshift(&self) -> u32 {
        self.bitshift
    }

    fn encode_inverted(&self, z: Complex) -> FixedComplex {
        // far-out inverted points bail in one iteration
        if z.mod_squared() >= 127.0 {
            self.encode(Complex::new(8.0, 8.0))
        } else {
            self.encode(z)
        }
    }

    fn to_fixed(&self, v: &FixedComplex) -> (i64, i64) {
        (v.x, v.y)
    }

    fn from_fixed(&self, x: i64, y: i64) -> FixedComplex {
        FixedComplex { x, y }
    }

    fn is_true(&self, v: &FixedComplex) -> bool {
        v.x != 0
    }

    fn bails_out(&self, v: &FixedComplex, overflow: bool) -> bool {
        overflow || v.x == 0
    }

    fn neg(&self, v: &mut FixedComplex) {
        v.x = -v.x;
        v.y = -v.y;
    }

    fn conj(&self, v: &mut FixedComplex) {
        v.y = -v.y;
    }

    fn abs(&self, v: &mut FixedComplex) {
        v.x = v.x.abs();
        v.y = v.y.abs();
    }

    fn flip(&self, v: &mut FixedComplex) {
        std::mem::swap(&mut v.x, &mut v.y);
    }

    fn real(&self, v: &mut FixedComplex) {
        v.y = 0;
    }

    fn imag(&self, v: &mut FixedComplex) {
        v.x = v.y;
        v.y = 0;
    }

    fn zero(&self, v: &mut FixedComplex) {
        *v = FixedComplex::default();
    }

    fn one(&self, v: &mut FixedComplex) {
        v.x = 1 << self.bitshift;
        v.y = 0;
    }

    fn recip(&self, v: &mut FixedComplex, overflow: &mut bool) {
        let m = multiply(v.x, v.x, self.bitshift, overflow)
            + multiply(v.y, v.y, self.bitshift, overflow);
        if self.compat.flags_denominator_overflow() {
            if m == 0 || *overflow {
                *overflow = true;
                return;
            }
        } else if m <= 0 {
            return;
        }
        v.x = divide(v.x, m, self.bitshift, overflow);
        v.y = -divide(v.y, m, self.bitshift, overflow);
    }

    fn sqr(&self, v: &mut FixedComplex, overflow: &mut bool) -> FixedComplex {
        let xx = multiply(v.x, v.x, self.bitshift, overflow);
        let yy = multiply(v.y, v.y, self.bitshift, overflow);
        v.y = multiply(v.x, v.y, self.bitshift, overflow) << 1;
        v.x = xx - yy;
        FixedComplex { x: xx + yy, y: 0 }
    }

    fn mod_squared(&self, v: &mut FixedComplex, overflow: &mut bool) {
        v.x = multiply(v.x, v.x, self.bitshift, overflow)
            + multiply(v.y, v.y, self.bitshift, overflow);
        if v.x < 0 {
            *overflow = true;
        }
        v.y = 0;
    }

    fn mod_squared_old(&self, v: &mut FixedComplex, below: &FixedComplex, overflow: &mut bool) {
        // pre-1827 releases multiplied against the operand below the top
        v.x = multiply(below.x, v.x, self.bitshift, overflow)
            + multiply(below.y, v.y, self.bitshift, overflow);
        if v.x < 0 {
            *overflow = true;
        }
        v.y = 0;
    }

    fn floor(&self, v: &mut FixedComplex) {
        v.x = (v.x >> self.bitshift) << self.bitshift;
        v.y = (v.y >> self.bitshift) << self.bitshift;
    }

    fn ceil(&self, v: &mut FixedComplex) {
        v.x = -(((-v.x) >> self.bitshift) << self.bitshift);
        v.y = -(((-v.y) >> self.bitshift) << self.bitshift);
    }

    fn trunc(&self, v: &mut FixedComplex) {
        let sx = v.x.signum();
        let sy = v.y.signum();
        v.x = ((v.x.abs() >> self.bitshift) << self.bitshift) * sx;
        v.y = ((v.y.abs() >> self.bitshift) << self.bitshift) * sy;
    }

    fn round(&self, v: &mut FixedComplex) {
        let half = 1i64 << (self.bitshift - 1);
        v.x += half;
        v.y += half;
        self.floor(v);
    }

    fn sin(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sin(z));
    }

    fn cos(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cos(z));
    }

    fn cosxx(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cosxx(z));
    }

    fn sinh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sinh(z));
    }

    fn cosh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cosh(z));
    }

    fn tan(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::tan);
    }

    fn tanh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::tanh);
    }

    fn cotan(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::cotan);
    }

    fn cotanh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::cotanh);
    }

    fn log(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::log(z));
    }

    fn exp(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::exp(z));
    }

    fn sqrt(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sqrt(z));
    }

    fn asin(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::asin(z));
    }

    fn acos(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::acos(z));
    }

    fn asinh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::asinh(z));
    }

    fn acosh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::acosh(z));
    }

    fn atan(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::atan);
    }

    fn atanh(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::atanh);
    }

    fn cabs(&self, v: &mut FixedComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cabs(z));
    }

    fn add(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = a.x.wrapping_add(b.x);
        a.y = a.y.wrapping_add(b.y);
    }

    fn sub(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = a.x.wrapping_sub(b.x);
        a.y = a.y.wrapping_sub(b.y);
    }

    fn mul(&self, a: &mut FixedComplex, b: &FixedComplex, overflow: &mut bool) {
        let n = self.bitshift;
        let x = multiply(a.x, b.x, n, overflow) - multiply(a.y, b.y, n, overflow);
        let y = multiply(a.y, b.x, n, overflow) + multiply(a.x, b.y, n, overflow);
        a.x = x;
        a.y = y;
    }

    fn div(&self, a: &mut FixedComplex, b: &FixedComplex, overflow: &mut bool) {
        let n = self.bitshift;
        let m = multiply(b.x, b.x, n, overflow) + multiply(b.y, b.y, n, overflow);
        let x = divide(b.x, m, n, overflow);
        let y = -divide(b.y, m, n, overflow);
        let x2 = multiply(a.x, x, n, overflow) - multiply(a.y, y, n, overflow);
        let y2 = multiply(a.y, x, n, overflow) + multiply(a.x, y, n, overflow);
        a.x = x2;
        a.y = y2;
    }

    fn pwr(&self, a: &mut FixedComplex, b: &FixedComplex, overflow: &mut bool) {
        let x = self.decode(a);
        let y = self.decode(b);
        let r = cmath::power(x, y, self.compat);
        if r.re.abs() < self.fg_limit() && r.im.abs() < self.fg_limit() {
            *a = self.encode(r);
        } else {
            *overflow = true;
        }
    }

    fn lt(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x < b.x);
        a.y = 0;
    }

    fn gt(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x > b.x);
        a.y = 0;
    }

    fn lte(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x <= b.x);
        a.y = 0;
    }

    fn gte(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x >= b.x);
        a.y = 0;
    }

    fn eq(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x == b.x);
        a.y = 0;
    }

    fn ne(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x != b.x);
        a.y = 0;
    }

    fn and(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x != 0 && b.x != 0);
        a.y = 0;
    }

    fn or(&self, a: &mut FixedComplex, b: &FixedComplex) {
        a.x = self.bool_val(a.x != 0 || b.x != 0);
        a.y = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> FixedBackend {
        FixedBackend::new(29, Compatibility::CURRENT)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let b = backend();
        let v = b.encode(Complex::new(1.25, -0.5));
        let z = b.decode(&v);
        assert!((z.re - 1.25).abs() < 1e-8);
        assert!((z.im + 0.5).abs() < 1e-8);
    }

    #[test]
    fn multiply_matches_double() {
        let b = backend();
        let mut ovf = false;
        let x = b.encode(Complex::new(1.5, 0.0)).x;
        let y = b.encode(Complex::new(2.5, 0.0)).x;
        let r = multiply(x, y, b.bitshift, &mut ovf);
        assert!(!ovf);
        assert!((r as f64 / b.fudge() - 3.75).abs() < 1e-8);
    }

    #[test]
    fn multiply_overflow_latches() {
        let mut ovf = false;
        let big = FIXED_MAX;
        let r = multiply(big, big, 16, &mut ovf);
        assert!(ovf);
        assert_eq!(r, FIXED_MAX);
    }

    #[test]
    fn divide_by_zero_latches() {
        let mut ovf = false;
        let r = divide(100, 0, 16, &mut ovf);
        assert!(ovf);
        assert_eq!(r, FIXED_MAX);
    }

    #[test]
    fn sqr_matches_float_backend() {
        let b = backend();
        let mut v = b.encode(Complex::new(0.5, -0.75));
        let mut ovf = false;
        let last = b.sqr(&mut v, &mut ovf);
        let z = b.decode(&v);
        assert!((z.re - (0.25 - 0.5625)).abs() < 1e-6);
        assert!((z.im - 2.0 * 0.5 * -0.75).abs() < 1e-6);
        let l = b.decode(&last);
        assert!((l.re - (0.25 + 0.5625)).abs() < 1e-6);
    }

    #[test]
    fn old_modulus_reads_below() {
        let b = FixedBackend::new(29, Compatibility { release: 1800 });
        let mut top = b.encode(Complex::new(2.0, 1.0));
        let below = b.encode(Complex::new(3.0, 4.0));
        let mut ovf = false;
        b.mod_squared_old(&mut top, &below, &mut ovf);
        // 3*2 + 4*1 = 10
        assert!((b.decode(&top).re - 10.0).abs() < 1e-6);
    }

    #[test]
    fn floor_truncates_toward_negative_infinity() {
        let b = backend();
        let mut v = b.encode(Complex::new(-1.25, 1.75));
        b.floor(&mut v);
        let z = b.decode(&v);
        assert_eq!(z.re, -2.0);
        assert_eq!(z.im, 1.0);
    }

    #[test]
    fn comparisons_fudge_result() {
        let b = backend();
        let mut a = b.encode(Complex::new(1.0, 0.0));
        let c = b.encode(Complex::new(2.0, 0.0));
        b.lt(&mut a, &c);
        assert_eq!(a.x, 1 << b.bitshift);
        assert_eq!(b.decode(&a).re, 1.0);
    }

    #[test]
    fn inverted_pixel_clamps_far_points() {
        let b = backend();
        let v = b.encode_inverted(Complex::new(100.0, 100.0));
        let z = b.decode(&v);
        assert_eq!(z, Complex::new(8.0, 8.0));
    }
}
