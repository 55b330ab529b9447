use std::ops::{Add, Mul, Neg, Sub};

use crate::{
    algebra::{self, Field},
    number::{is_negative, Number, NumberError},
    real::{integral, Real},
};

/// Complex number over a real representation `N`.
///
/// A little more granular than `num::Complex`: every operation that can fail
/// (division, logarithms) says so in its signature, and the transcendental
/// functions are built from the [`Number`] primitives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Complex<N> {
    pub re: N,
    pub im: N,
}

impl<N: Number> Complex<N> {
    pub fn new(re: N, im: N) -> Self {
        Self { re, im }
    }

    pub fn zero() -> Self {
        Self::new(N::zero(), N::zero())
    }

    pub fn one() -> Self {
        Self::new(N::one(), N::zero())
    }

    pub fn i() -> Self {
        Self::new(N::zero(), N::one())
    }

    pub fn from_real(re: N) -> Self {
        Self::new(re, N::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.re.is_zero() && self.im.is_zero()
    }

    /// Squares the given number.
    /// This takes fewer operations than a generic multiply.
    pub fn square(&self) -> Self {
        // (a+bi)^2 = (a^2-b^2) + 2abi
        let re = self.re.clone() * self.re.clone() - self.im.clone() * self.im.clone();
        let ab = self.re.clone() * self.im.clone();
        let im = ab.clone() + ab;
        Self { re, im }
    }

    pub fn conj(&self) -> Self {
        Self::new(self.re.clone(), -self.im.clone())
    }

    /// `|z|²`, which needs no square root.
    pub fn abs_squared(&self) -> N {
        self.re.clone() * self.re.clone() + self.im.clone() * self.im.clone()
    }

    pub fn abs(&self) -> Result<N, NumberError> {
        self.re.hypot(&self.im)
    }

    /// The principal argument, in `(−π, π]`.
    pub fn arg(&self) -> N {
        self.im.atan2(&self.re)
    }

    pub fn scale(&self, factor: &N) -> Self {
        Self::new(
            self.re.clone() * factor.clone(),
            self.im.clone() * factor.clone(),
        )
    }

    pub fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        // (a+bi)/(c+di) = ((ac+bd) + (bc-ad)i) / (c²+d²)
        let denominator = divisor.abs_squared();
        if denominator.is_zero() {
            return Err(NumberError::DivisionByZero);
        }
        let (a, b) = (&self.re, &self.im);
        let (c, d) = (&divisor.re, &divisor.im);
        let re = a.clone() * c.clone() + b.clone() * d.clone();
        let im = b.clone() * c.clone() - a.clone() * d.clone();
        Ok(Self::new(
            re.divide(&denominator)?,
            im.divide(&denominator)?,
        ))
    }

    pub fn reciprocal(&self) -> Result<Self, NumberError> {
        Self::one().divide(self)
    }

    /// Integer power by binary exponentiation.
    pub fn to_the(&self, n: i32) -> Result<Self, NumberError> {
        algebra::to_the(self, n)
    }

    pub fn exp(&self) -> Self {
        let magnitude = self.re.exp();
        Self::new(
            magnitude.clone() * self.im.cos(),
            magnitude * self.im.sin(),
        )
    }

    /// The principal logarithm.
    pub fn ln(&self) -> Result<Self, NumberError> {
        if self.is_zero() {
            return Err(NumberError::Domain {
                operation: "ln",
                value: "0".to_owned(),
            });
        }
        Ok(Self::new(self.abs()?.ln()?, self.arg()))
    }

    /// `self^exponent` on the principal branch.
    pub fn pow(&self, exponent: &Self) -> Result<Self, NumberError> {
        if exponent.im.is_zero() {
            return self.pow_real(&exponent.re);
        }
        if self.is_zero() {
            return Err(NumberError::Domain {
                operation: "pow",
                value: format!("0^{:?}", exponent),
            });
        }
        Ok((exponent.clone() * self.ln()?).exp())
    }

    /// `self^exponent` for a real exponent; integral exponents are exact.
    pub fn pow_real(&self, exponent: &N) -> Result<Self, NumberError> {
        if let Some(n) = integral(exponent) {
            return self.to_the(n);
        }
        if self.is_zero() {
            return if is_negative(exponent) || exponent.is_zero() {
                Err(NumberError::DivisionByZero)
            } else {
                Ok(Self::zero())
            };
        }
        Ok(self.ln()?.scale(exponent).exp())
    }

    /// The principal `n`th root.
    pub fn nth_root(&self, n: i32) -> Result<Self, NumberError> {
        if n == 0 {
            return Err(NumberError::Domain {
                operation: "nth_root",
                value: "0".to_owned(),
            });
        }
        if n == 2 {
            return self.sqrt();
        }
        if self.is_zero() {
            return if n > 0 {
                Ok(Self::zero())
            } else {
                Err(NumberError::DivisionByZero)
            };
        }
        let root = N::from_i32(n);
        let magnitude = Real::new(self.abs()?).nth_root(n)?.into_inner();
        let angle = self.arg().divide(&root)?;
        Ok(Self::new(
            magnitude.clone() * angle.cos(),
            magnitude * angle.sin(),
        ))
    }

    /// The principal square root, with the cut along the negative real axis.
    pub fn sqrt(&self) -> Result<Self, NumberError> {
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let r = self.abs()?;
        let clamp = |v: N| if is_negative(&v) { N::zero() } else { v };
        let re = clamp((r.clone() + self.re.clone()).half()).sqrt()?;
        let im = clamp((r - self.re.clone()).half()).sqrt()?;
        let im = if is_negative(&self.im) { -im } else { im };
        Ok(Self::new(re, im))
    }

    fn sinh_cosh(value: &N) -> (N, N) {
        let e = value.exp();
        let inverse = (-value.clone()).exp();
        (
            (e.clone() - inverse.clone()).half(),
            (e + inverse).half(),
        )
    }

    pub fn sin(&self) -> Self {
        // sin(a+bi) = sin a cosh b + i cos a sinh b
        let (sinh, cosh) = Self::sinh_cosh(&self.im);
        Self::new(self.re.sin() * cosh, self.re.cos() * sinh)
    }

    pub fn cos(&self) -> Self {
        // cos(a+bi) = cos a cosh b − i sin a sinh b
        let (sinh, cosh) = Self::sinh_cosh(&self.im);
        Self::new(self.re.cos() * cosh, -(self.re.sin() * sinh))
    }

    pub fn tan(&self) -> Result<Self, NumberError> {
        self.sin().divide(&self.cos())
    }

    pub fn sinh(&self) -> Self {
        // sinh(a+bi) = sinh a cos b + i cosh a sin b
        let (sinh, cosh) = Self::sinh_cosh(&self.re);
        Self::new(sinh * self.im.cos(), cosh * self.im.sin())
    }

    pub fn cosh(&self) -> Self {
        // cosh(a+bi) = cosh a cos b + i sinh a sin b
        let (sinh, cosh) = Self::sinh_cosh(&self.re);
        Self::new(cosh * self.im.cos(), sinh * self.im.sin())
    }

    pub fn tanh(&self) -> Result<Self, NumberError> {
        self.sinh().divide(&self.cosh())
    }

    /// Whether `|self − other|² < epsilon_squared`.
    pub fn near(&self, other: &Self, epsilon_squared: &N) -> bool {
        (self.clone() - other.clone()).abs_squared() < *epsilon_squared
    }
}

impl<N: Number> Field for Complex<N> {
    fn one_like(&self) -> Self {
        Self::one()
    }

    fn product(&self, other: &Self) -> Self {
        self.clone() * other.clone()
    }

    fn squared(&self) -> Self {
        self.square()
    }

    fn reciprocal(&self) -> Result<Self, NumberError> {
        Complex::reciprocal(self)
    }

    fn quotient(&self, divisor: &Self) -> Result<Self, NumberError> {
        self.divide(divisor)
    }
}

impl<N> Mul<Complex<N>> for Complex<N>
where
    N: Clone + Add<N, Output = N> + Sub<N, Output = N> + Mul<N, Output = N>,
{
    type Output = Complex<N>;

    fn mul(self, rhs: Complex<N>) -> Self {
        // (a + ib) * (c + id) = (ac - bd) + i(ad + bc)
        let (a, b) = (self.re, self.im);
        let (c, d) = (rhs.re, rhs.im);
        let re: N = (a.clone() * c.clone()) - (b.clone() * d.clone());
        let im: N = a * d + b * c;
        Self { re, im }
    }
}

impl<N> Add<Complex<N>> for Complex<N>
where
    N: Add<N, Output = N>,
{
    type Output = Complex<N>;

    fn add(self, rhs: Complex<N>) -> Self {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl<N> Sub<Complex<N>> for Complex<N>
where
    N: Sub<N, Output = N>,
{
    type Output = Complex<N>;

    fn sub(self, rhs: Complex<N>) -> Self {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl<N> Neg for Complex<N>
where
    N: Neg<Output = N>,
{
    type Output = Complex<N>;

    fn neg(self) -> Self {
        Self {
            re: -self.re,
            im: -self.im,
        }
    }
}
