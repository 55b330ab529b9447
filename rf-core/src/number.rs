use std::{
    cmp::Ordering,
    fmt::Debug,
    ops::{Add, Mul, Neg, Sub},
};

use num::{BigInt, BigRational, ToPrimitive};
use thiserror::Error;

use crate::{decimal::Decimal, decimal::DecimalError, masked_float::MaskedFloat, series};

/// Decimal digits kept by transcendental functions on [`BigRational`].
pub const RATIONAL_DIGITS: usize = 40;

/// Errors raised by numeric operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum NumberError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{operation} is undefined for {value}")]
    Domain {
        operation: &'static str,
        value: String,
    },
    #[error("cannot represent {0}")]
    Conversion(String),
    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

impl NumberError {
    fn domain(operation: &'static str, value: &impl Debug) -> Self {
        NumberError::Domain {
            operation,
            value: format!("{:?}", value),
        }
    }
}

/// A real-number representation that formulas can be computed in.
///
/// The field operations come from the operator traits. Everything else the
/// complex layer needs is expressed in terms of the handful of primitives
/// below, which each representation supplies.
pub trait Number:
    Sized
    + Clone
    + Debug
    + PartialEq
    + PartialOrd
    + Add<Self, Output = Self>
    + Sub<Self, Output = Self>
    + Mul<Self, Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    fn from_i32(i: i32) -> Self;

    fn zero() -> Self {
        Self::from_i32(0)
    }

    fn one() -> Self {
        Self::from_i32(1)
    }

    /// Converts an exact value, rounding as the representation requires.
    fn from_bigrational(value: &BigRational) -> Result<Self, NumberError>;

    fn from_decimal(value: &Decimal) -> Result<Self, NumberError> {
        Self::from_bigrational(&value.to_rational()?)
    }

    fn to_f64(&self) -> f64;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Total comparison; unordered values compare equal.
    fn compare(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }

    fn half(&self) -> Self;

    fn divide(&self, divisor: &Self) -> Result<Self, NumberError>;

    fn sqrt(&self) -> Result<Self, NumberError>;

    /// `sqrt(self² + other²)`.
    fn hypot(&self, other: &Self) -> Result<Self, NumberError> {
        (self.clone() * self.clone() + other.clone() * other.clone()).sqrt()
    }

    /// The angle of `(x, self)`, in `(−π, π]`.
    fn atan2(&self, x: &Self) -> Self;

    fn ln(&self) -> Result<Self, NumberError>;

    fn exp(&self) -> Self;

    fn sin(&self) -> Self;

    fn cos(&self) -> Self;

    fn pi() -> Self;
}

macro_rules! impl_float {
    ($t:ident, $convert:ident) => {
        impl Number for $t {
            fn from_i32(i: i32) -> Self {
                i as $t
            }

            fn from_bigrational(value: &BigRational) -> Result<Self, NumberError> {
                ToPrimitive::$convert(value)
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| NumberError::Conversion(value.to_string()))
            }

            fn from_decimal(value: &Decimal) -> Result<Self, NumberError> {
                let text = value.to_normalized_string();
                text.parse::<$t>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or(NumberError::Conversion(text))
            }

            fn to_f64(&self) -> f64 {
                *self as f64
            }

            fn is_zero(&self) -> bool {
                *self == 0.0
            }

            fn half(&self) -> Self {
                *self * 0.5
            }

            fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
                if *divisor == 0.0 {
                    return Err(NumberError::DivisionByZero);
                }
                Ok(*self / *divisor)
            }

            fn sqrt(&self) -> Result<Self, NumberError> {
                if *self < 0.0 {
                    return Err(NumberError::domain("sqrt", self));
                }
                Ok(<$t>::sqrt(*self))
            }

            fn hypot(&self, other: &Self) -> Result<Self, NumberError> {
                Ok(<$t>::hypot(*self, *other))
            }

            fn atan2(&self, x: &Self) -> Self {
                <$t>::atan2(*self, *x)
            }

            fn ln(&self) -> Result<Self, NumberError> {
                if *self <= 0.0 {
                    return Err(NumberError::domain("ln", self));
                }
                Ok(<$t>::ln(*self))
            }

            fn exp(&self) -> Self {
                <$t>::exp(*self)
            }

            fn sin(&self) -> Self {
                <$t>::sin(*self)
            }

            fn cos(&self) -> Self {
                <$t>::cos(*self)
            }

            fn pi() -> Self {
                std::$t::consts::PI
            }
        }
    };
}

impl_float!(f32, to_f32);
impl_float!(f64, to_f64);

/// Exact field operations; transcendental functions are rounded to
/// [`RATIONAL_DIGITS`] decimal places.
impl Number for BigRational {
    fn from_i32(i: i32) -> Self {
        BigRational::from_integer(i.into())
    }

    fn from_bigrational(value: &BigRational) -> Result<Self, NumberError> {
        Ok(value.clone())
    }

    fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
    }

    fn is_zero(&self) -> bool {
        num::Zero::is_zero(self)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn half(&self) -> Self {
        self / BigRational::from_integer(BigInt::from(2u8))
    }

    fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        if num::Zero::is_zero(divisor) {
            return Err(NumberError::DivisionByZero);
        }
        Ok(self / divisor)
    }

    fn sqrt(&self) -> Result<Self, NumberError> {
        series::sqrt(self, RATIONAL_DIGITS).ok_or_else(|| NumberError::domain("sqrt", self))
    }

    fn atan2(&self, x: &Self) -> Self {
        series::atan2(self, x, RATIONAL_DIGITS)
    }

    fn ln(&self) -> Result<Self, NumberError> {
        series::ln(self, RATIONAL_DIGITS).ok_or_else(|| NumberError::domain("ln", self))
    }

    fn exp(&self) -> Self {
        series::exp(self, RATIONAL_DIGITS)
    }

    fn sin(&self) -> Self {
        series::sin_cos(self, RATIONAL_DIGITS).0
    }

    fn cos(&self) -> Self {
        series::sin_cos(self, RATIONAL_DIGITS).1
    }

    fn pi() -> Self {
        series::pi(RATIONAL_DIGITS)
    }
}

/// Every operation goes through `f64` and is masked again afterwards.
impl<const E: usize, const F: usize> Number for MaskedFloat<E, F> {
    fn from_i32(i: i32) -> Self {
        MaskedFloat::new(i.into())
    }

    fn from_bigrational(value: &BigRational) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(f64::from_bigrational(value)?))
    }

    fn from_decimal(value: &Decimal) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(f64::from_decimal(value)?))
    }

    fn to_f64(&self) -> f64 {
        (*self).into()
    }

    fn half(&self) -> Self {
        MaskedFloat::new(Number::to_f64(self) * 0.5)
    }

    fn divide(&self, divisor: &Self) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(
            Number::to_f64(self).divide(&Number::to_f64(divisor))?,
        ))
    }

    fn sqrt(&self) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(Number::sqrt(&Number::to_f64(self))?))
    }

    fn hypot(&self, other: &Self) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(f64::hypot(
            Number::to_f64(self),
            Number::to_f64(other),
        )))
    }

    fn atan2(&self, x: &Self) -> Self {
        MaskedFloat::new(f64::atan2(Number::to_f64(self), Number::to_f64(x)))
    }

    fn ln(&self) -> Result<Self, NumberError> {
        Ok(MaskedFloat::new(Number::ln(&Number::to_f64(self))?))
    }

    fn exp(&self) -> Self {
        MaskedFloat::new(f64::exp(Number::to_f64(self)))
    }

    fn sin(&self) -> Self {
        MaskedFloat::new(f64::sin(Number::to_f64(self)))
    }

    fn cos(&self) -> Self {
        MaskedFloat::new(f64::cos(Number::to_f64(self)))
    }

    fn pi() -> Self {
        MaskedFloat::new(std::f64::consts::PI)
    }
}

/// Whether `value` is a negative number, for representations where that is decidable.
pub(crate) fn is_negative<V: Number>(value: &V) -> bool {
    value.compare(&V::zero()) == Ordering::Less
}
