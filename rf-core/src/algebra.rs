//! Operations shared by [`Real`](crate::real::Real) and [`Complex`](crate::complex::Complex).

use crate::number::NumberError;

/// The multiplicative structure needed for integer powers.
pub(crate) trait Field: Clone {
    /// The multiplicative identity of the same kind as `self`.
    fn one_like(&self) -> Self;

    fn product(&self, other: &Self) -> Self;

    fn squared(&self) -> Self {
        self.product(self)
    }

    fn reciprocal(&self) -> Result<Self, NumberError>;

    fn quotient(&self, divisor: &Self) -> Result<Self, NumberError>;
}

/// `base` raised to an integer power.
///
/// Negative powers are the reciprocal of the positive power. `i32::MIN` has no
/// positive counterpart, so it is computed as `base^-(i32::MAX) / base`.
pub(crate) fn to_the<T: Field>(base: &T, n: i32) -> Result<T, NumberError> {
    if n >= 0 {
        return Ok(positive_power(base, n as u32));
    }
    match n.checked_neg() {
        Some(m) => positive_power(base, m as u32).reciprocal(),
        None => positive_power(base, i32::MAX as u32)
            .reciprocal()?
            .quotient(base),
    }
}

fn positive_power<T: Field>(base: &T, n: u32) -> T {
    match n {
        0 => base.one_like(),
        1 => base.clone(),
        2 => base.squared(),
        3 => base.squared().product(base),
        4 => base.squared().squared(),
        _ => {
            let mut result: Option<T> = None;
            let mut square = base.clone();
            let mut n = n;
            loop {
                if n & 1 == 1 {
                    result = Some(match result {
                        None => square.clone(),
                        Some(r) => r.product(&square),
                    });
                }
                n >>= 1;
                if n == 0 {
                    break;
                }
                square = square.squared();
            }
            // n > 4 has at least one set bit.
            result.unwrap_or_else(|| base.one_like())
        }
    }
}
