//! Arbitrary-precision backend.
//!
//! Addition, subtraction, multiplication, division, squaring, modulus and
//! the comparisons run at the configured precision. Transcendentals
//! convert through the shared floating-point library and back, so only the
//! iteration arithmetic gains precision.

use dashu_float::FBig;
use frm_core::Complex;

use crate::backend::{Compatibility, MathBackend};
use crate::cmath;

/// A complex value as a pair of big floats.
#[derive(Clone, PartialEq, Debug)]
pub struct BigComplex {
    pub re: FBig,
    pub im: FBig,
}

/// The arbitrary-precision math type.
#[derive(Clone, Debug)]
pub struct BigBackend {
    /// Binary digits of working precision.
    pub precision: usize,
    /// Fudge shift, kept for `srand`/`rand` bit compatibility.
    pub bitshift: u32,
    pub compat: Compatibility,
}

impl BigBackend {
    pub fn new(precision: usize, bitshift: u32, compat: Compatibility) -> Self {
        Self {
            precision,
            bitshift,
            compat,
        }
    }

    fn fudge(&self) -> f64 {
        (1i64 << self.bitshift) as f64
    }

    fn real_from_f64(&self, x: f64) -> FBig {
        if !x.is_finite() {
            return FBig::ZERO;
        }
        match FBig::try_from(x) {
            Ok(v) => v.with_precision(self.precision).value(),
            Err(_) => FBig::ZERO,
        }
    }

    fn to_f64(v: &FBig) -> f64 {
        v.to_f64().value()
    }

    fn norm(&self, v: FBig) -> FBig {
        v.with_precision(self.precision).value()
    }

    fn bool_val(&self, b: bool) -> FBig {
        if b {
            self.real_from_f64(1.0)
        } else {
            FBig::ZERO
        }
    }

    /// Apply a float-library function through a double round-trip.
    fn via_f64(
        &self,
        v: &mut BigComplex,
        overflow: &mut bool,
        f: impl FnOnce(&mut Complex, Compatibility, &mut bool),
    ) {
        let mut z = self.decode(v);
        f(&mut z, self.compat, overflow);
        *v = self.encode(z);
    }
}

impl MathBackend for BigBackend {
    type Num = BigComplex;

    fn encode(&self, z: Complex) -> BigComplex {
        BigComplex {
            re: self.real_from_f64(z.re),
            im: self.real_from_f64(z.im),
        }
    }

    fn decode(&self, v: &BigComplex) -> Complex {
        Complex::new(Self::to_f64(&v.re), Self::to_f64(&v.im))
    }

    fn bitshift(&self) -> u32 {
        self.bitshift
    }

    fn to_fixed(&self, v: &BigComplex) -> (i64, i64) {
        let z = self.decode(v);
        let fg = self.fudge();
        ((z.re * fg) as i64, (z.im * fg) as i64)
    }

    fn from_fixed(&self, x: i64, y: i64) -> BigComplex {
        let fg = self.fudge();
        self.encode(Complex::new(x as f64 / fg, y as f64 / fg))
    }

    fn is_true(&self, v: &BigComplex) -> bool {
        v.re != FBig::ZERO
    }

    fn bails_out(&self, v: &BigComplex, _overflow: bool) -> bool {
        v.re == FBig::ZERO
    }

    fn neg(&self, v: &mut BigComplex) {
        v.re = -v.re.clone();
        v.im = -v.im.clone();
    }

    fn conj(&self, v: &mut BigComplex) {
        v.im = -v.im.clone();
    }

    fn abs(&self, v: &mut BigComplex) {
        if v.re < FBig::ZERO {
            v.re = -v.re.clone();
        }
        if v.im < FBig::ZERO {
            v.im = -v.im.clone();
        }
    }

    fn flip(&self, v: &mut BigComplex) {
        std::mem::swap(&mut v.re, &mut v.im);
    }

    fn real(&self, v: &mut BigComplex) {
        v.im = FBig::ZERO;
    }

    fn imag(&self, v: &mut BigComplex) {
        v.re = v.im.clone();
        v.im = FBig::ZERO;
    }

    fn zero(&self, v: &mut BigComplex) {
        v.re = FBig::ZERO;
        v.im = FBig::ZERO;
    }

    fn one(&self, v: &mut BigComplex) {
        v.re = self.real_from_f64(1.0);
        v.im = FBig::ZERO;
    }

    fn recip(&self, v: &mut BigComplex, overflow: &mut bool) {
        let m = self.norm(v.re.clone() * v.re.clone() + v.im.clone() * v.im.clone());
        if m == FBig::ZERO {
            *overflow = true;
            return;
        }
        v.re = self.norm(v.re.clone() / m.clone());
        v.im = -self.norm(v.im.clone() / m);
    }

    fn sqr(&self, v: &mut BigComplex, _overflow: &mut bool) -> BigComplex {
        let xx = self.norm(v.re.clone() * v.re.clone());
        let yy = self.norm(v.im.clone() * v.im.clone());
        v.im = self.norm(v.re.clone() * v.im.clone() * self.real_from_f64(2.0));
        v.re = self.norm(xx.clone() - yy.clone());
        BigComplex {
            re: self.norm(xx + yy),
            im: FBig::ZERO,
        }
    }

    fn mod_squared(&self, v: &mut BigComplex, _overflow: &mut bool) {
        v.re = self.norm(v.re.clone() * v.re.clone() + v.im.clone() * v.im.clone());
        v.im = FBig::ZERO;
    }

    fn floor(&self, v: &mut BigComplex) {
        let mut ovf = false;
        self.via_f64(v, &mut ovf, |z, _, _| cmath::floor(z));
    }

    fn ceil(&self, v: &mut BigComplex) {
        let mut ovf = false;
        self.via_f64(v, &mut ovf, |z, _, _| cmath::ceil(z));
    }

    fn trunc(&self, v: &mut BigComplex) {
        let mut ovf = false;
        self.via_f64(v, &mut ovf, |z, _, _| cmath::trunc(z));
    }

    fn round(&self, v: &mut BigComplex) {
        let mut ovf = false;
        self.via_f64(v, &mut ovf, |z, _, _| cmath::round(z));
    }

    fn sin(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sin(z));
    }

    fn cos(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cos(z));
    }

    fn cosxx(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cosxx(z));
    }

    fn sinh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sinh(z));
    }

    fn cosh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cosh(z));
    }

    fn tan(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::tan);
    }

    fn tanh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::tanh);
    }

    fn cotan(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::cotan);
    }

    fn cotanh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::cotanh);
    }

    fn log(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::log(z));
    }

    fn exp(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::exp(z));
    }

    fn sqrt(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::sqrt(z));
    }

    fn asin(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::asin(z));
    }

    fn acos(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::acos(z));
    }

    fn asinh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::asinh(z));
    }

    fn acosh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::acosh(z));
    }

    fn atan(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::atan);
    }

    fn atanh(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, cmath::atanh);
    }

    fn cabs(&self, v: &mut BigComplex, overflow: &mut bool) {
        self.via_f64(v, overflow, |z, _, _| cmath::cabs(z));
    }

    fn add(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.norm(a.re.clone() + b.re.clone());
        a.im = self.norm(a.im.clone() + b.im.clone());
    }

    fn sub(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.norm(a.re.clone() - b.re.clone());
        a.im = self.norm(a.im.clone() - b.im.clone());
    }

    fn mul(&self, a: &mut BigComplex, b: &BigComplex, _overflow: &mut bool) {
        let re = self.norm(a.re.clone() * b.re.clone() - a.im.clone() * b.im.clone());
        let im = self.norm(a.re.clone() * b.im.clone() + a.im.clone() * b.re.clone());
        a.re = re;
        a.im = im;
    }

    fn div(&self, a: &mut BigComplex, b: &BigComplex, overflow: &mut bool) {
        let m = self.norm(b.re.clone() * b.re.clone() + b.im.clone() * b.im.clone());
        if m == FBig::ZERO {
            *overflow = true;
            return;
        }
        let re = self.norm(
            (a.re.clone() * b.re.clone() + a.im.clone() * b.im.clone()) / m.clone(),
        );
        let im = self.norm((a.im.clone() * b.re.clone() - a.re.clone() * b.im.clone()) / m);
        a.re = re;
        a.im = im;
    }

    fn pwr(&self, a: &mut BigComplex, b: &BigComplex, _overflow: &mut bool) {
        let x = self.decode(a);
        let y = self.decode(b);
        *a = self.encode(cmath::power(x, y, self.compat));
    }

    fn lt(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re < b.re);
        a.im = FBig::ZERO;
    }

    fn gt(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re > b.re);
        a.im = FBig::ZERO;
    }

    fn lte(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re <= b.re);
        a.im = FBig::ZERO;
    }

    fn gte(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re >= b.re);
        a.im = FBig::ZERO;
    }

    fn eq(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re == b.re);
        a.im = FBig::ZERO;
    }

    fn ne(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re != b.re);
        a.im = FBig::ZERO;
    }

    fn and(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re != FBig::ZERO && b.re != FBig::ZERO);
        a.im = FBig::ZERO;
    }

    fn or(&self, a: &mut BigComplex, b: &BigComplex) {
        a.re = self.bool_val(a.re != FBig::ZERO || b.re != FBig::ZERO);
        a.im = FBig::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> BigBackend {
        BigBackend::new(100, 29, Compatibility::CURRENT)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let b = backend();
        let v = b.encode(Complex::new(1.5, -0.25));
        assert_eq!(b.decode(&v), Complex::new(1.5, -0.25));
    }

    #[test]
    fn mul_matches_float() {
        let b = backend();
        let mut a = b.encode(Complex::new(1.0, 2.0));
        let c = b.encode(Complex::new(3.0, -1.0));
        let mut ovf = false;
        b.mul(&mut a, &c, &mut ovf);
        assert_eq!(b.decode(&a), Complex::new(5.0, 5.0));
    }

    #[test]
    fn sqr_updates_last_sqr() {
        let b = backend();
        let mut v = b.encode(Complex::new(3.0, 4.0));
        let mut ovf = false;
        let last = b.sqr(&mut v, &mut ovf);
        assert_eq!(b.decode(&v), Complex::new(-7.0, 24.0));
        assert_eq!(b.decode(&last), Complex::new(25.0, 0.0));
    }

    #[test]
    fn div_by_zero_latches_overflow() {
        let b = backend();
        let mut a = b.encode(Complex::new(1.0, 1.0));
        let zero = b.encode(Complex::ZERO);
        let mut ovf = false;
        b.div(&mut a, &zero, &mut ovf);
        assert!(ovf);
    }

    #[test]
    fn comparisons_are_real_axis() {
        let b = backend();
        let mut a = b.encode(Complex::new(1.0, 50.0));
        let c = b.encode(Complex::new(2.0, -50.0));
        b.lt(&mut a, &c);
        assert_eq!(b.decode(&a), Complex::ONE);
    }

    #[test]
    fn bails_out_on_zero_real() {
        let b = backend();
        assert!(b.bails_out(&b.encode(Complex::new(0.0, 3.0)), false));
        assert!(!b.bails_out(&b.encode(Complex::ONE), false));
    }
}
