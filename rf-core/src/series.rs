//! Transcendental kernels for the exact representations.
//!
//! Every kernel takes rationals and a number of decimal digits, evaluates on
//! big integers scaled by `10^w` (where `w` adds guard digits to the request) and
//! rounds the result half away from zero to the requested digit count.

use num::{BigInt, BigRational, Integer, Signed, Zero};

/// Extra digits carried through every kernel.
const GUARD: usize = 12;

/// Divides, rounding half away from zero.
pub(crate) fn div_round(n: &BigInt, d: &BigInt) -> BigInt {
    let (q, r) = n.div_rem(d);
    if r.abs() * 2u8 >= d.abs() {
        q + n.signum() * d.signum()
    } else {
        q
    }
}

/// Rounds to `digits` fractional decimal digits.
pub(crate) fn round_to(value: &BigRational, digits: usize) -> BigRational {
    let unit = num::pow(BigInt::from(10u8), digits);
    BigRational::new(div_round(&(value.numer() * &unit), value.denom()), unit)
}

/// Fixed-point arithmetic on integers scaled by `10^digits`.
struct Scaled {
    unit: BigInt,
}

impl Scaled {
    fn new(digits: usize) -> Self {
        Scaled {
            unit: num::pow(BigInt::from(10u8), digits),
        }
    }

    fn from_rational(&self, value: &BigRational) -> BigInt {
        div_round(&(value.numer() * &self.unit), value.denom())
    }

    fn to_rational(&self, value: BigInt) -> BigRational {
        BigRational::new(value, self.unit.clone())
    }

    fn mul(&self, a: &BigInt, b: &BigInt) -> BigInt {
        div_round(&(a * b), &self.unit)
    }

    fn div(&self, a: &BigInt, b: &BigInt) -> BigInt {
        div_round(&(a * &self.unit), b)
    }

    fn sqrt(&self, a: &BigInt) -> BigInt {
        // floor(2·sqrt(a·unit)), then halve with rounding.
        let doubled = (a * &self.unit * 4u8).sqrt();
        (doubled + 1u8) >> 1
    }

    /// `atan(1/n)` by its alternating series.
    fn atan_inverse(&self, n: u32) -> BigInt {
        let n_squared = BigInt::from(n) * n;
        let mut power = div_round(&self.unit, &BigInt::from(n));
        let mut sum = power.clone();
        let mut k = 1u32;
        loop {
            power = div_round(&power, &n_squared);
            k += 2;
            let term = div_round(&power, &BigInt::from(k));
            if term.is_zero() {
                return sum;
            }
            if k % 4 == 3 {
                sum -= term;
            } else {
                sum += term;
            }
        }
    }

    fn pi(&self) -> BigInt {
        // Machin: π = 16·atan(1/5) − 4·atan(1/239)
        self.atan_inverse(5) * 16u8 - self.atan_inverse(239) * 4u8
    }

    /// `atan(t)` for `|t| ≤ 1`.
    fn atan(&self, t: &BigInt) -> BigInt {
        // Two halvings of the angle bring |t| below tan(π/16).
        let mut t = t.clone();
        for _ in 0..2 {
            let radius = self.sqrt(&(&self.unit + self.mul(&t, &t)));
            t = self.div(&t, &(&self.unit + radius));
        }
        let t_squared = self.mul(&t, &t);
        let mut power = t.clone();
        let mut sum = t;
        let mut k = 1u32;
        loop {
            power = -self.mul(&power, &t_squared);
            k += 2;
            let term = div_round(&power, &BigInt::from(k));
            if term.is_zero() {
                return sum * 4u8;
            }
            sum += term;
        }
    }

    /// `2·atanh(t)`, i.e. `ln((1+t)/(1−t))`, for `|t| ≤ 1/3`.
    fn ln_ratio(&self, t: &BigInt) -> BigInt {
        let t_squared = self.mul(t, t);
        let mut power = t.clone();
        let mut sum = t.clone();
        let mut k = 1u32;
        loop {
            power = self.mul(&power, &t_squared);
            k += 2;
            let term = div_round(&power, &BigInt::from(k));
            if term.is_zero() {
                return sum * 2u8;
            }
            sum += term;
        }
    }
}

/// Number of decimal digits in the integer part of `|value|`.
fn integer_digits(value: &BigRational) -> usize {
    let bits = value.abs().to_integer().bits() as usize;
    bits * 3 / 10 + 1
}

pub(crate) fn sqrt(value: &BigRational, digits: usize) -> Option<BigRational> {
    if value.is_negative() {
        return None;
    }
    let s = Scaled::new(digits + GUARD);
    let root = s.sqrt(&s.from_rational(value));
    Some(round_to(&s.to_rational(root), digits))
}

pub(crate) fn exp(value: &BigRational, digits: usize) -> BigRational {
    if value.is_zero() {
        return BigRational::from_integer(1.into());
    }
    // Halve until |x| ≤ 1/2; each squaring afterwards doubles the relative error.
    let halvings = value.abs().to_integer().bits() as usize + 1;
    let s = Scaled::new(digits + GUARD + halvings * 3 / 10 + 1);
    let reduced = value.abs() / BigRational::from_integer(BigInt::from(1u8) << halvings);
    let r = s.from_rational(&reduced);

    let mut sum = s.unit.clone();
    let mut term = s.unit.clone();
    let mut n = 1u32;
    loop {
        term = div_round(&s.mul(&term, &r), &BigInt::from(n));
        if term.is_zero() {
            break;
        }
        sum += &term;
        n += 1;
    }
    for _ in 0..halvings {
        sum = s.mul(&sum, &sum);
    }
    if value.is_negative() {
        sum = s.div(&s.unit, &sum);
    }
    round_to(&s.to_rational(sum), digits)
}

pub(crate) fn ln(value: &BigRational, digits: usize) -> Option<BigRational> {
    if !value.is_positive() {
        return None;
    }
    // value = m·2^e with m in (1/2, 2).
    let e = value.numer().bits() as i64 - value.denom().bits() as i64;
    let power = BigRational::from_integer(BigInt::from(1u8) << e.unsigned_abs());
    let m = if e >= 0 { value / power } else { value * power };

    let s = Scaled::new(digits + GUARD + e.unsigned_abs().to_string().len());
    let one = BigRational::from_integer(1.into());
    let t = s.from_rational(&((&m - &one) / (&m + &one)));
    let ln_m = s.ln_ratio(&t);
    // ln 2 = 2·atanh(1/3)
    let ln_two = s.ln_ratio(&div_round(&s.unit, &BigInt::from(3u8)));
    let result = ln_two * e + ln_m;
    Some(round_to(&s.to_rational(result), digits))
}

pub(crate) fn pi(digits: usize) -> BigRational {
    let s = Scaled::new(digits + GUARD);
    round_to(&s.to_rational(s.pi()), digits)
}

/// Sine and cosine of the same argument.
pub(crate) fn sin_cos(value: &BigRational, digits: usize) -> (BigRational, BigRational) {
    let s = Scaled::new(digits + GUARD + integer_digits(value));
    let x = s.from_rational(value);
    let two_pi = s.pi() * 2u8;
    let turns = div_round(&x, &two_pi);
    let r = x - turns * two_pi;
    let r_squared = s.mul(&r, &r);

    let series = |first: BigInt, offset: u32| {
        let mut term = first.clone();
        let mut sum = first;
        let mut n = offset;
        loop {
            term = -div_round(
                &s.mul(&term, &r_squared),
                &BigInt::from((n + 1) as u64 * (n + 2) as u64),
            );
            if term.is_zero() {
                return sum;
            }
            sum += &term;
            n += 2;
        }
    };
    let sin = series(r.clone(), 1);
    let cos = series(s.unit.clone(), 0);
    (
        round_to(&s.to_rational(sin), digits),
        round_to(&s.to_rational(cos), digits),
    )
}

/// The angle of the point `(x, y)`, in `(−π, π]`.
pub(crate) fn atan2(y: &BigRational, x: &BigRational, digits: usize) -> BigRational {
    if y.is_zero() && x.is_zero() {
        return BigRational::zero();
    }
    let s = Scaled::new(digits + GUARD);
    let pi = s.pi();
    let angle = if y.abs() <= x.abs() {
        let a = s.atan(&s.from_rational(&(y / x)));
        if x.is_positive() {
            a
        } else if y.is_negative() {
            a - pi
        } else {
            a + pi
        }
    } else {
        let a = s.atan(&s.from_rational(&(x / y)));
        let quarter = div_round(&pi, &BigInt::from(2u8));
        if y.is_positive() {
            quarter - a
        } else {
            -quarter - a
        }
    };
    round_to(&s.to_rational(angle), digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::ToPrimitive;

    fn r(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    fn close(value: &BigRational, expected: f64) -> bool {
        (ToPrimitive::to_f64(value).unwrap() - expected).abs() < 1e-12
    }

    #[test]
    fn div_round_is_half_away_from_zero() {
        let b = |v: i64| BigInt::from(v);
        assert_eq!(div_round(&b(5), &b(2)), b(3));
        assert_eq!(div_round(&b(-5), &b(2)), b(-3));
        assert_eq!(div_round(&b(7), &b(3)), b(2));
        assert_eq!(div_round(&b(-7), &b(-3)), b(2));
        assert_eq!(div_round(&b(8), &b(-3)), b(-3));
    }

    #[test]
    fn pi_digits() {
        assert_eq!(
            pi(30),
            r(3_141_592_653_589_793, 1_000_000_000_000_000)
                + BigRational::new(
                    "238462643383280".parse::<BigInt>().unwrap(),
                    num::pow(BigInt::from(10u8), 30),
                )
        );
    }

    #[test]
    fn sqrt_of_two() {
        let root = sqrt(&r(2, 1), 40).unwrap();
        let squared = &root * &root;
        let error = (squared - r(2, 1)).abs();
        assert!(error < BigRational::new(1.into(), num::pow(BigInt::from(10u8), 38)));
        assert!(sqrt(&r(-1, 1), 10).is_none());
        assert_eq!(sqrt(&r(9, 4), 10).unwrap(), r(3, 2));
    }

    #[test]
    fn exp_and_ln_match_floats() {
        for (n, d) in [(1, 1), (-1, 1), (5, 2), (-37, 4), (1, 1000), (100, 1)] {
            let x = r(n, d);
            let expected = (n as f64 / d as f64).exp();
            let value = ToPrimitive::to_f64(&exp(&x, 30)).unwrap();
            assert!(((value - expected) / expected).abs() < 1e-12, "exp({}/{})", n, d);
        }
        for (n, d) in [(1, 2), (2, 1), (10, 1), (1, 1000), (123_456, 7)] {
            let x = r(n, d);
            assert!(close(&ln(&x, 30).unwrap(), (n as f64 / d as f64).ln()), "ln({}/{})", n, d);
        }
        assert_eq!(ln(&r(1, 1), 20).unwrap(), BigRational::zero());
        assert!(ln(&r(0, 1), 20).is_none());
        assert!(ln(&r(-2, 1), 20).is_none());
    }

    #[test]
    fn exp_inverts_ln() {
        let x = r(7, 3);
        let back = exp(&ln(&x, 40).unwrap(), 40);
        assert!((back - &x).abs() < BigRational::new(1.into(), num::pow(BigInt::from(10u8), 35)));
    }

    #[test]
    fn trigonometry_matches_floats() {
        for (n, d) in [(0, 1), (1, 2), (-3, 1), (22, 7), (1000, 1), (-12345, 100)] {
            let x = n as f64 / d as f64;
            let (sin, cos) = sin_cos(&r(n, d), 30);
            assert!(close(&sin, x.sin()), "sin({})", x);
            assert!(close(&cos, x.cos()), "cos({})", x);
        }
    }

    #[test]
    fn atan2_covers_all_quadrants() {
        let points = [
            (1, 1),
            (1, -1),
            (-1, -1),
            (-1, 1),
            (3, 0),
            (-3, 0),
            (0, -2),
            (1, 7),
            (7, 1),
        ];
        for (y, x) in points {
            let angle = atan2(&r(y, 1), &r(x, 1), 30);
            assert!(close(&angle, (y as f64).atan2(x as f64)), "atan2({}, {})", y, x);
        }
        assert_eq!(atan2(&r(0, 1), &r(0, 1), 10), BigRational::zero());
    }
}
