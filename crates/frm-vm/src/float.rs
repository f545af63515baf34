//! Floating-point backend: `Complex` pairs of doubles.

use frm_core::Complex;

use crate::backend::{Compatibility, MathBackend};
use crate::cmath;

/// The double-precision math type.
#[derive(Copy, Clone, Debug)]
pub struct FloatBackend {
    /// Fudge shift, kept for `srand`/`rand` bit compatibility with the
    /// fixed backend.
    pub bitshift: u32,
    pub compat: Compatibility,
}

impl FloatBackend {
    pub fn new(bitshift: u32, compat: Compatibility) -> Self {
        Self { bitshift, compat }
    }

    fn fudge(&self) -> f64 {
        (1i64 << self.bitshift) as f64
    }
}

impl MathBackend for FloatBackend {
    type Num = Complex;

    fn encode(&self, z: Complex) -> Complex {
        z
    }

    fn decode(&self, v: &Complex) -> Complex {
        *v
    }

    fn bitshift(&self) -> u32 {
        self.bitshift
    }

    fn to_fixed(&self, v: &Complex) -> (i64, i64) {
        let fg = self.fudge();
        ((v.re * fg) as i64, (v.im * fg) as i64)
    }

    fn from_fixed(&self, x: i64, y: i64) -> Complex {
        let fg = self.fudge();
        Complex::new(x as f64 / fg, y as f64 / fg)
    }

    fn is_true(&self, v: &Complex) -> bool {
        v.re != 0.0
    }

    fn bails_out(&self, v: &Complex, _overflow: bool) -> bool {
        v.re == 0.0
    }

    fn neg(&self, v: &mut Complex) {
        v.re = -v.re;
        v.im = -v.im;
    }

    fn conj(&self, v: &mut Complex) {
        v.im = -v.im;
    }

    fn abs(&self, v: &mut Complex) {
        v.re = v.re.abs();
        v.im = v.im.abs();
    }

    fn flip(&self, v: &mut Complex) {
        std::mem::swap(&mut v.re, &mut v.im);
    }

    fn real(&self, v: &mut Complex) {
        v.im = 0.0;
    }

    fn imag(&self, v: &mut Complex) {
        v.re = v.im;
        v.im = 0.0;
    }

    fn zero(&self, v: &mut Complex) {
        *v = Complex::ZERO;
    }

    fn one(&self, v: &mut Complex) {
        *v = Complex::ONE;
    }

    fn recip(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::recip(v, self.compat, overflow);
    }

    fn sqr(&self, v: &mut Complex, _overflow: &mut bool) -> Complex {
        let xx = v.re * v.re;
        let yy = v.im * v.im;
        v.im = v.re * v.im * 2.0;
        v.re = xx - yy;
        Complex::new(xx + yy, 0.0)
    }

    fn mod_squared(&self, v: &mut Complex, _overflow: &mut bool) {
        v.re = v.re * v.re + v.im * v.im;
        v.im = 0.0;
    }

    fn floor(&self, v: &mut Complex) {
        cmath::floor(v);
    }

    fn ceil(&self, v: &mut Complex) {
        cmath::ceil(v);
    }

    fn trunc(&self, v: &mut Complex) {
        cmath::trunc(v);
    }

    fn round(&self, v: &mut Complex) {
        cmath::round(v);
    }

    fn sin(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::sin(v);
    }

    fn cos(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::cos(v);
    }

    fn cosxx(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::cosxx(v);
    }

    fn sinh(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::sinh(v);
    }

    fn cosh(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::cosh(v);
    }

    fn tan(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::tan(v, self.compat, overflow);
    }

    fn tanh(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::tanh(v, self.compat, overflow);
    }

    fn cotan(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::cotan(v, self.compat, overflow);
    }

    fn cotanh(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::cotanh(v, self.compat, overflow);
    }

    fn log(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::log(v);
    }

    fn exp(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::exp(v);
    }

    fn sqrt(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::sqrt(v);
    }

    fn asin(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::asin(v);
    }

    fn acos(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::acos(v);
    }

    fn asinh(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::asinh(v);
    }

    fn acosh(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::acosh(v);
    }

    fn atan(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::atan(v, self.compat, overflow);
    }

    fn atanh(&self, v: &mut Complex, overflow: &mut bool) {
        cmath::atanh(v, self.compat, overflow);
    }

    fn cabs(&self, v: &mut Complex, _overflow: &mut bool) {
        cmath::cabs(v);
    }

    fn add(&self, a: &mut Complex, b: &Complex) {
        a.re += b.re;
        a.im += b.im;
    }

    fn sub(&self, a: &mut Complex, b: &Complex) {
        a.re -= b.re;
        a.im -= b.im;
    }

    fn mul(&self, a: &mut Complex, b: &Complex, _overflow: &mut bool) {
        *a = cmath::mul(*a, *b);
    }

    fn div(&self, a: &mut Complex, b: &Complex, overflow: &mut bool) {
        *a = cmath::div(*a, *b, self.compat, overflow);
    }

    fn pwr(&self, a: &mut Complex, b: &Complex, _overflow: &mut bool) {
        *a = cmath::power(*a, *b, self.compat);
    }

    fn lt(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re < b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn gt(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re > b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn lte(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re <= b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn gte(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re >= b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn eq(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re == b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn ne(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re != b.re) as i32 as f64;
        a.im = 0.0;
    }

    fn and(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re != 0.0 && b.re != 0.0) as i32 as f64;
        a.im = 0.0;
    }

    fn or(&self, a: &mut Complex, b: &Complex) {
        a.re = (a.re != 0.0 || b.re != 0.0) as i32 as f64;
        a.im = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> FloatBackend {
        FloatBackend::new(29, Compatibility::CURRENT)
    }

    #[test]
    fn sqr_updates_last_sqr() {
        let b = backend();
        let mut v = Complex::new(3.0, 4.0);
        let mut ovf = false;
        let last = b.sqr(&mut v, &mut ovf);
        assert_eq!(v, Complex::new(-7.0, 24.0));
        assert_eq!(last, Complex::new(25.0, 0.0));
    }

    #[test]
    fn comparisons_are_real_axis() {
        let b = backend();
        let mut a = Complex::new(1.0, 99.0);
        b.lt(&mut a, &Complex::new(2.0, -5.0));
        assert_eq!(a, Complex::ONE);

        let mut a = Complex::new(3.0, 0.0);
        b.lt(&mut a, &Complex::new(2.0, 0.0));
        assert_eq!(a, Complex::ZERO);
    }

    #[test]
    fn fixed_roundtrip() {
        let b = backend();
        let v = Complex::new(0.5, -0.25);
        let (x, y) = b.to_fixed(&v);
        let back = b.from_fixed(x, y);
        assert!((back.re - 0.5).abs() < 1e-8);
        assert!((back.im + 0.25).abs() < 1e-8);
    }

    #[test]
    fn bailout_on_zero_real() {
        let b = backend();
        assert!(b.bails_out(&Complex::new(0.0, 5.0), false));
        assert!(!b.bails_out(&Complex::new(1.0, 0.0), false));
    }
}
