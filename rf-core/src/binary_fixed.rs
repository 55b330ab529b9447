//! Binary fixed-point numbers backed by the `fixed` crate.
//!
//! The `fixed` types panic (debug) or wrap (release) on overflow. Escape-time
//! iteration routinely runs past the representable range right before it
//! bails out, so [`BinaryFixed`] saturates instead: a saturated magnitude still
//! compares as escaped.

use std::{
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

use fixed::traits::Fixed;
use num::{BigRational, ToPrimitive};

use crate::{
    number::{Number, NumberError},
    series::div_round,
};

pub use fixed::types;

/// A saturating wrapper around one of the `fixed` crate's types.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinaryFixed<F>(pub F);

impl<F: Fixed> BinaryFixed<F> {
    pub fn from_bits(bits: F::Bits) -> Self {
        BinaryFixed(F::from_bits(bits))
    }

    pub fn to_bits(self) -> F::Bits {
        self.0.to_bits()
    }

    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            BinaryFixed(F::default())
        } else {
            BinaryFixed(F::saturating_from_num(value))
        }
    }
}

impl<F: fmt::Display> fmt::Display for BinaryFixed<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<F: Fixed> Add for BinaryFixed<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        BinaryFixed(self.0.saturating_add(other.0))
    }
}

impl<F: Fixed> Sub for BinaryFixed<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        BinaryFixed(self.0.saturating_sub(other.0))
    }
}

impl<F: Fixed> Mul for BinaryFixed<F> {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        BinaryFixed(self.0.saturating_mul(other.0))
    }
}

impl<F: Fixed> Neg for BinaryFixed<F> {
    type Output = Self;

    fn neg(self) -> Self {
        BinaryFixed(self.0.saturating_neg())
    }
}

/// Exact conversions round to nearest; transcendentals go through `f64`.
impl<F: Fixed + Send + Sync + 'static> Number for BinaryFixed<F> {
    fn from_i32(i: i32) -> Self {
        BinaryFixed(F::saturating_from_num(i))
    }

    fn from_bigrational(value: &BigRational) -> Result<Self, NumberError> {
        let out_of_range = || NumberError::Conversion(value.to_string());
        let scaled = div_round(
            &(value.numer().clone() << F::FRAC_NBITS as usize),
            value.denom(),
        );
        let bits = scaled.to_i128().ok_or_else(out_of_range)?;
        Ok(BinaryFixed::from_bits(
            bits.try_into().map_err(|_| out_of_range())?,
        ))
    }

    fn to_f64(&self) -> f64 {
        self.0.to_num::<f64>()
    }

    fn is_zero(&self) -> bool {
        self.0 == F::default()
    }

    fn half(&self) -> Self {
        BinaryFixed(self.0 >> 1u32)
    }

    fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        if divisor.is_zero() {
            return Err(NumberError::DivisionByZero);
        }
        self.0
            .checked_div(divisor.0)
            .map(BinaryFixed)
            .ok_or_else(|| NumberError::Conversion(format!("{} / {}", self, divisor)))
    }

    fn sqrt(&self) -> Result<Self, NumberError> {
        Ok(Self::from_f64(Number::sqrt(&Number::to_f64(self))?))
    }

    fn atan2(&self, x: &Self) -> Self {
        Self::from_f64(f64::atan2(Number::to_f64(self), Number::to_f64(x)))
    }

    fn ln(&self) -> Result<Self, NumberError> {
        Ok(Self::from_f64(Number::ln(&Number::to_f64(self))?))
    }

    fn exp(&self) -> Self {
        Self::from_f64(f64::exp(Number::to_f64(self)))
    }

    fn sin(&self) -> Self {
        Self::from_f64(f64::sin(Number::to_f64(self)))
    }

    fn cos(&self) -> Self {
        Self::from_f64(f64::cos(Number::to_f64(self)))
    }

    fn pi() -> Self {
        Self::from_f64(std::f64::consts::PI)
    }
}
