use std::{
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

use num::{BigInt, BigRational, Signed, ToPrimitive, Zero};

use crate::{
    decimal::Decimal,
    number::{Number, NumberError},
    series::{self, div_round},
};

/// A decimal fixed-point number with `D` fractional digits.
///
/// The integer part is unbounded. Addition and subtraction are exact;
/// products and quotients are rounded half away from zero to `D` digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigFixed<const D: usize> {
    scaled: BigInt,
}

impl<const D: usize> BigFixed<D> {
    fn unit() -> BigInt {
        num::pow(BigInt::from(10u8), D)
    }

    /// The value as an exact rational.
    pub fn to_rational(&self) -> BigRational {
        BigRational::new(self.scaled.clone(), Self::unit())
    }

    fn from_rounded(value: &BigRational) -> Self {
        BigFixed {
            scaled: div_round(&(value.numer() * Self::unit()), value.denom()),
        }
    }
}

impl<const D: usize> fmt::Display for BigFixed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Decimal::from_rational(&self.to_rational(), D))
    }
}

impl<const D: usize> Add for BigFixed<D> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        BigFixed {
            scaled: self.scaled + other.scaled,
        }
    }
}

impl<const D: usize> Sub for BigFixed<D> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        BigFixed {
            scaled: self.scaled - other.scaled,
        }
    }
}

impl<const D: usize> Mul for BigFixed<D> {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        BigFixed {
            scaled: div_round(&(self.scaled * other.scaled), &Self::unit()),
        }
    }
}

impl<const D: usize> Neg for BigFixed<D> {
    type Output = Self;

    fn neg(self) -> Self {
        BigFixed {
            scaled: -self.scaled,
        }
    }
}

impl<const D: usize> Number for BigFixed<D> {
    fn from_i32(i: i32) -> Self {
        BigFixed {
            scaled: BigInt::from(i) * Self::unit(),
        }
    }

    fn from_bigrational(value: &BigRational) -> Result<Self, NumberError> {
        Ok(Self::from_rounded(value))
    }

    fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(&self.to_rational()).unwrap_or(f64::NAN)
    }

    fn is_zero(&self) -> bool {
        self.scaled.is_zero()
    }

    fn compare(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp(other)
    }

    fn half(&self) -> Self {
        BigFixed {
            scaled: div_round(&self.scaled, &BigInt::from(2u8)),
        }
    }

    fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        if divisor.scaled.is_zero() {
            return Err(NumberError::DivisionByZero);
        }
        Ok(BigFixed {
            scaled: div_round(&(&self.scaled * Self::unit()), &divisor.scaled),
        })
    }

    fn sqrt(&self) -> Result<Self, NumberError> {
        if self.scaled.is_negative() {
            return Err(NumberError::Domain {
                operation: "sqrt",
                value: self.to_string(),
            });
        }
        series::sqrt(&self.to_rational(), D)
            .map(|r| Self::from_rounded(&r))
            .ok_or(NumberError::Conversion(self.to_string()))
    }

    fn atan2(&self, x: &Self) -> Self {
        Self::from_rounded(&series::atan2(&self.to_rational(), &x.to_rational(), D))
    }

    fn ln(&self) -> Result<Self, NumberError> {
        series::ln(&self.to_rational(), D)
            .map(|r| Self::from_rounded(&r))
            .ok_or_else(|| NumberError::Domain {
                operation: "ln",
                value: self.to_string(),
            })
    }

    fn exp(&self) -> Self {
        Self::from_rounded(&series::exp(&self.to_rational(), D))
    }

    fn sin(&self) -> Self {
        Self::from_rounded(&series::sin_cos(&self.to_rational(), D).0)
    }

    fn cos(&self) -> Self {
        Self::from_rounded(&series::sin_cos(&self.to_rational(), D).1)
    }

    fn pi() -> Self {
        Self::from_rounded(&series::pi(D))
    }
}
