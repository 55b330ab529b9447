//! Exact decimal values for user-entered parameters.
//!
//! A [`Decimal`] keeps exactly the digits it was given; it never passes through a
//! binary floating-point value. This is what rectangle corners and Julia points are
//! stored as, so that they survive text and storage round trips unchanged.

use std::{cmp::Ordering, fmt, str::FromStr};

use num::{
    bigint::{BigInt, Sign},
    BigRational, Signed,
};
use thiserror::Error;

/// Largest decimal exponent accepted when converting to a rational.
const MAX_RATIONAL_EXPONENT: usize = 100_000;

/// Errors from parsing or converting a [`Decimal`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DecimalError {
    #[error("empty decimal")]
    Empty,
    #[error("unexpected character {found:?} at position {position}")]
    UnexpectedCharacter { position: usize, found: char },
    #[error("expected digits at position {position}")]
    MissingDigits { position: usize },
    #[error("exponent {0} is out of range")]
    ExponentOutOfRange(BigInt),
    #[error("{0} is not a finite number")]
    NotFinite(f64),
}

/// An exact, normalized decimal number.
///
/// The canonical form is a sign, a mantissa of significant digits `d₁d₂…dₙ`
/// (no leading or trailing zeros) and an exponent `e`, representing
/// `d₁.d₂…dₙ × 10^e`. Zero has an empty mantissa and a zero exponent.
/// Because the form is canonical, `1`, `1.0` and `10e-1` are the same value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    sign: Sign,
    mantissa: String,
    exponent: BigInt,
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal {
            sign: Sign::NoSign,
            mantissa: String::new(),
            exponent: BigInt::default(),
        }
    }

    /// Builds the canonical form of `int.frac × 10^exponent`.
    fn from_parts(negative: bool, int_digits: &str, frac_digits: &str, exponent: BigInt) -> Self {
        let digits = format!("{}{}", int_digits, frac_digits);
        let leading = digits.bytes().take_while(|b| *b == b'0').count();
        if leading == digits.len() {
            return Self::zero();
        }
        let mantissa = digits[leading..].trim_end_matches('0').to_owned();
        // int.frac = 0.(digits) × 10^len(int); dropping the leading zeros and moving
        // the point behind the first significant digit shifts by (leading + 1).
        let shift = int_digits.len() as i64 - leading as i64 - 1;
        Decimal {
            sign: if negative { Sign::Minus } else { Sign::Plus },
            mantissa,
            exponent: exponent + BigInt::from(shift),
        }
    }

    /// Returns -1, 0 or 1.
    pub fn signum(&self) -> i32 {
        match self.sign {
            Sign::Minus => -1,
            Sign::NoSign => 0,
            Sign::Plus => 1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sign == Sign::NoSign
    }

    /// The significant digits, without leading or trailing zeros.
    pub fn mantissa(&self) -> &str {
        &self.mantissa
    }

    /// The power of ten applied to the first significant digit.
    pub fn exponent(&self) -> &BigInt {
        &self.exponent
    }

    pub fn abs(&self) -> Self {
        let mut out = self.clone();
        if out.sign == Sign::Minus {
            out.sign = Sign::Plus;
        }
        out
    }

    /// Canonical scientific notation, e.g. `-1.25e-3`; `0` for zero.
    ///
    /// Parsing the result yields an equal value.
    pub fn to_normalized_string(&self) -> String {
        if self.is_zero() {
            return "0".to_owned();
        }
        let mut out = String::new();
        if self.sign == Sign::Minus {
            out.push('-');
        }
        out.push_str(&self.mantissa[..1]);
        if self.mantissa.len() > 1 {
            out.push('.');
            out.push_str(&self.mantissa[1..]);
        }
        out.push('e');
        out.push_str(&self.exponent.to_string());
        out
    }

    /// Converts to an exact rational.
    pub fn to_rational(&self) -> Result<BigRational, DecimalError> {
        if self.is_zero() {
            return Ok(BigRational::from_integer(BigInt::default()));
        }
        let digits: BigInt = self
            .mantissa
            .parse()
            .map_err(|_| DecimalError::MissingDigits { position: 0 })?;
        let digits = if self.sign == Sign::Minus { -digits } else { digits };
        let shift = &self.exponent - BigInt::from(self.mantissa.len() as i64 - 1);
        let magnitude = shift
            .abs()
            .try_into()
            .ok()
            .filter(|v: &usize| *v <= MAX_RATIONAL_EXPONENT)
            .ok_or_else(|| DecimalError::ExponentOutOfRange(self.exponent.clone()))?;
        let scale = num::pow(BigInt::from(10u8), magnitude);
        Ok(if shift.is_negative() {
            BigRational::new(digits, scale)
        } else {
            BigRational::from_integer(digits * scale)
        })
    }

    /// Rounds a rational to `digits` fractional digits, half away from zero.
    pub fn from_rational(value: &BigRational, digits: usize) -> Self {
        let scale = num::pow(BigInt::from(10u8), digits);
        let scaled = (value * BigRational::from_integer(scale)).round().to_integer();
        let negative = scaled.is_negative();
        let text = scaled.abs().to_string();
        Self::from_parts(negative, &text, "", BigInt::from(-(digits as i64)))
    }

    /// The shortest decimal that reads back as the same `f64`.
    pub fn from_f64(value: f64) -> Result<Self, DecimalError> {
        if !value.is_finite() {
            return Err(DecimalError::NotFinite(value));
        }
        format!("{:e}", value).parse()
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        let text = value.unsigned_abs().to_string();
        Self::from_parts(value < 0, &text, "", BigInt::default())
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(mut self) -> Decimal {
        self.sign = -self.sign;
        self
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.sign != other.sign {
            return self.sign.cmp(&other.sign);
        }
        // Canonical mantissas start with a non-zero digit, so for equal exponents
        // lexicographic digit order is numeric order.
        let magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then_with(|| self.mantissa.cmp(&other.mantissa));
        match self.sign {
            Sign::Minus => magnitude.reverse(),
            Sign::NoSign => Ordering::Equal,
            Sign::Plus => magnitude,
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    /// Parses `[sign] digits [. digits] [(e|E) [sign] digits]`.
    fn from_str(text: &str) -> Result<Self, DecimalError> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return Err(DecimalError::Empty);
        }
        let digits_from = |start: usize| {
            start
                + bytes[start..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count()
        };
        let sign_at = |pos: usize| match bytes.get(pos) {
            Some(b'-') => (true, pos + 1),
            Some(b'+') => (false, pos + 1),
            _ => (false, pos),
        };

        let (negative, int_start) = sign_at(0);
        let mut pos = digits_from(int_start);
        if pos == int_start {
            return Err(DecimalError::MissingDigits { position: pos });
        }
        let int_digits = &text[int_start..pos];

        let mut frac_digits = "";
        if bytes.get(pos) == Some(&b'.') {
            let start = pos + 1;
            pos = digits_from(start);
            if pos == start {
                return Err(DecimalError::MissingDigits { position: pos });
            }
            frac_digits = &text[start..pos];
        }

        let mut exponent = BigInt::default();
        if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
            let (exp_negative, start) = sign_at(pos + 1);
            pos = digits_from(start);
            if pos == start {
                return Err(DecimalError::MissingDigits { position: pos });
            }
            exponent = text[start..pos]
                .parse()
                .map_err(|_| DecimalError::MissingDigits { position: start })?;
            if exp_negative {
                exponent = -exponent;
            }
        }

        if let Some(found) = text[pos..].chars().next() {
            return Err(DecimalError::UnexpectedCharacter {
                position: pos,
                found,
            });
        }
        Ok(Self::from_parts(negative, int_digits, frac_digits, exponent))
    }
}

impl fmt::Display for Decimal {
    /// Plain notation for exponents in `-7..=20`, scientific otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exponent = match i64::try_from(&self.exponent) {
            Ok(e) if (-7..=20).contains(&e) && !self.is_zero() => e,
            _ => return f.write_str(&self.to_normalized_string()),
        };
        if self.sign == Sign::Minus {
            f.write_str("-")?;
        }
        let digits = &self.mantissa;
        if exponent < 0 {
            let zeros = "0".repeat((-exponent - 1) as usize);
            write!(f, "0.{}{}", zeros, digits)
        } else {
            let int_len = exponent as usize + 1;
            if digits.len() <= int_len {
                write!(f, "{}{}", digits, "0".repeat(int_len - digits.len()))
            } else {
                write!(f, "{}.{}", &digits[..int_len], &digits[int_len..])
            }
        }
    }
}
