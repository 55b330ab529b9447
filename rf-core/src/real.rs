use std::{
    cmp::Ordering,
    ops::{Add, Mul, Neg, Sub},
};

use crate::{
    algebra::{self, Field},
    number::{is_negative, Number, NumberError},
};

/// A real number over the representation `V`.
///
/// The transcendental layer is written once here in terms of the primitives
/// each [`Number`] supplies.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub struct Real<V>(pub V);

impl<V: Number> Real<V> {
    pub fn new(value: V) -> Self {
        Real(value)
    }

    pub fn zero() -> Self {
        Real(V::zero())
    }

    pub fn one() -> Self {
        Real(V::one())
    }

    pub fn from_i32(i: i32) -> Self {
        Real(V::from_i32(i))
    }

    pub fn value(&self) -> &V {
        &self.0
    }

    pub fn into_inner(self) -> V {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.0.compare(&other.0)
    }

    pub fn signum(&self) -> i32 {
        match self.0.compare(&V::zero()) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    pub fn abs(&self) -> Self {
        if is_negative(&self.0) {
            Real(-self.0.clone())
        } else {
            self.clone()
        }
    }

    pub fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        Ok(Real(self.0.divide(&divisor.0)?))
    }

    pub fn reciprocal(&self) -> Result<Self, NumberError> {
        Self::one().divide(self)
    }

    /// Integer power by binary exponentiation.
    pub fn to_the(&self, n: i32) -> Result<Self, NumberError> {
        algebra::to_the(self, n)
    }

    pub fn sqrt(&self) -> Result<Self, NumberError> {
        Ok(Real(self.0.sqrt()?))
    }

    pub fn hypot(&self, other: &Self) -> Result<Self, NumberError> {
        Ok(Real(self.0.hypot(&other.0)?))
    }

    pub fn atan2(&self, x: &Self) -> Self {
        Real(self.0.atan2(&x.0))
    }

    pub fn ln(&self) -> Result<Self, NumberError> {
        Ok(Real(self.0.ln()?))
    }

    pub fn exp(&self) -> Self {
        Real(self.0.exp())
    }

    pub fn sin(&self) -> Self {
        Real(self.0.sin())
    }

    pub fn cos(&self) -> Self {
        Real(self.0.cos())
    }

    pub fn tan(&self) -> Result<Self, NumberError> {
        self.sin().divide(&self.cos())
    }

    pub fn sinh(&self) -> Self {
        let e = self.0.exp();
        let inverse = (-self.0.clone()).exp();
        Real((e - inverse).half())
    }

    pub fn cosh(&self) -> Self {
        let e = self.0.exp();
        let inverse = (-self.0.clone()).exp();
        Real((e + inverse).half())
    }

    pub fn tanh(&self) -> Result<Self, NumberError> {
        self.sinh().divide(&self.cosh())
    }

    /// `self` raised to a real power.
    ///
    /// Integral exponents use [`Real::to_the`], so negative bases are allowed for
    /// them; any other exponent of a negative base is a domain error.
    pub fn pow(&self, exponent: &Self) -> Result<Self, NumberError> {
        if let Some(n) = integral(&exponent.0) {
            return self.to_the(n);
        }
        if self.is_zero() {
            return if exponent.signum() > 0 {
                Ok(Self::zero())
            } else {
                Err(NumberError::DivisionByZero)
            };
        }
        if self.signum() < 0 {
            return Err(NumberError::Domain {
                operation: "pow",
                value: format!("{:?}^{:?}", self.0, exponent.0),
            });
        }
        Ok(Real(exponent.0.clone() * self.0.ln()?).exp())
    }

    /// The real `n`th root. Odd roots of negative numbers are negative.
    pub fn nth_root(&self, n: i32) -> Result<Self, NumberError> {
        let domain = || NumberError::Domain {
            operation: "nth_root",
            value: format!("{:?}", self.0),
        };
        match n {
            0 => return Err(domain()),
            1 => return Ok(self.clone()),
            2 => return self.sqrt(),
            _ => {}
        }
        if n < 0 {
            return self.nth_root(n.checked_neg().ok_or_else(domain)?)?.reciprocal();
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        if self.signum() < 0 {
            if n % 2 == 0 {
                return Err(domain());
            }
            return Ok(-self.abs().nth_root(n)?);
        }
        let scaled = self.0.ln()?.divide(&V::from_i32(n))?;
        Ok(Real(scaled.exp()))
    }
}

/// The exponent as an `i32`, if it is exactly one.
pub(crate) fn integral<V: Number>(value: &V) -> Option<i32> {
    let f = value.to_f64();
    if f.fract() != 0.0 || f < i32::MIN as f64 || f > i32::MAX as f64 {
        return None;
    }
    let candidate = f as i32;
    if V::from_i32(candidate) == *value {
        Some(candidate)
    } else {
        None
    }
}

impl<V: Number> Field for Real<V> {
    fn one_like(&self) -> Self {
        Self::one()
    }

    fn product(&self, other: &Self) -> Self {
        Real(self.0.clone() * other.0.clone())
    }

    fn reciprocal(&self) -> Result<Self, NumberError> {
        Real::reciprocal(self)
    }

    fn quotient(&self, divisor: &Self) -> Result<Self, NumberError> {
        self.divide(divisor)
    }
}

impl<V: Number> Add for Real<V> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Real(self.0 + other.0)
    }
}

impl<V: Number> Sub for Real<V> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Real(self.0 - other.0)
    }
}

impl<V: Number> Mul for Real<V> {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Real(self.0 * other.0)
    }
}

impl<V: Number> Neg for Real<V> {
    type Output = Self;

    fn neg(self) -> Self {
        Real(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::BigRational;

    type Exact = Real<BigRational>;

    fn exact(n: i64, d: i64) -> Exact {
        Real(BigRational::new(n.into(), d.into()))
    }

    fn float(v: f64) -> Real<f64> {
        Real(v)
    }

    fn repeated<V: Number>(base: &Real<V>, n: i32) -> Real<V> {
        (0..n).fold(Real::one(), |acc, _| acc * base.clone())
    }

    #[test]
    fn integer_powers_are_exact() {
        let base = exact(-3, 7);
        for n in 0..=16 {
            let power = base.to_the(n).unwrap();
            assert_eq!(power, repeated(&base, n), "n = {}", n);
            assert_eq!(
                base.to_the(-n).unwrap(),
                power.reciprocal().unwrap(),
                "n = -{}",
                n
            );
        }
    }

    #[test]
    fn integer_powers_of_floats() {
        let base = float(1.1);
        for n in 0..=16 {
            let power = base.to_the(n).unwrap().to_f64();
            let expected = repeated(&base, n).to_f64();
            assert!((power - expected).abs() < 1e-12, "n = {}", n);
            let inverse = base.to_the(-n).unwrap().to_f64();
            assert!((inverse - 1.0 / power).abs() < 1e-12, "n = -{}", n);
        }
    }

    #[test]
    fn extreme_negative_power() {
        assert_eq!(exact(1, 1).to_the(i32::MIN).unwrap(), exact(1, 1));
        assert_eq!(exact(-1, 1).to_the(i32::MIN).unwrap(), exact(1, 1));
        assert_eq!(exact(-1, 1).to_the(i32::MAX).unwrap(), exact(-1, 1));
        assert_eq!(float(2.0).to_the(i32::MIN).unwrap().to_f64(), 0.0);
        assert_eq!(exact(0, 1).to_the(-2), Err(NumberError::DivisionByZero));
    }

    #[test]
    fn real_powers() {
        assert_eq!(exact(-2, 1).pow(&exact(3, 1)).unwrap(), exact(-8, 1));
        assert_eq!(exact(4, 1).pow(&exact(-1, 2)).unwrap().to_f64(), 0.5);
        assert!(exact(-2, 1).pow(&exact(1, 2)).is_err());
        assert_eq!(exact(0, 1).pow(&exact(1, 2)).unwrap(), exact(0, 1));
        assert!(exact(0, 1).pow(&exact(-1, 2)).is_err());
        let p = float(2.0).pow(&float(0.5)).unwrap().to_f64();
        assert!((p - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn roots() {
        let cube = float(-27.0).nth_root(3).unwrap().to_f64();
        assert!((cube + 3.0).abs() < 1e-12);
        assert!(float(-16.0).nth_root(4).is_err());
        assert!(float(16.0).nth_root(0).is_err());
        let quarter = float(16.0).nth_root(-4).unwrap().to_f64();
        assert!((quarter - 0.5).abs() < 1e-12);
        assert_eq!(exact(9, 4).nth_root(2).unwrap(), exact(3, 2));
    }

    #[test]
    fn hyperbolic_identities() {
        for v in [-2.0, -0.5, 0.0, 0.75, 3.0] {
            let x = float(v);
            let (s, c) = (x.sinh().to_f64(), x.cosh().to_f64());
            assert!((s - v.sinh()).abs() < 1e-12);
            assert!((c - v.cosh()).abs() < 1e-12);
            assert!((c * c - s * s - 1.0).abs() < 1e-9);
            assert!((x.tanh().unwrap().to_f64() - v.tanh()).abs() < 1e-12);
        }
        let t = exact(1, 3).tan().unwrap().to_f64();
        assert!((t - (1.0f64 / 3.0).tan()).abs() < 1e-15);
    }

    #[test]
    fn sign_and_magnitude() {
        assert_eq!(exact(-5, 2).abs(), exact(5, 2));
        assert_eq!(exact(-5, 2).signum(), -1);
        assert_eq!(exact(0, 2).signum(), 0);
        assert_eq!(float(3.0).signum(), 1);
        assert_eq!(float(3.0).hypot(&float(4.0)).unwrap().to_f64(), 5.0);
    }
}
