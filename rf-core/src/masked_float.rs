//! An `f64` with a narrowed exponent and fraction, for watching precision run out.

use std::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

const EXPONENT: usize = 11;
const FRACTION: usize = 52;
const SIGN_MASK: u64 = 1 << 63;
const EXPONENT_SIGN_MASK: u64 = 1 << 62;
const EXPONENT_MASK: u64 = ((1 << EXPONENT) - 1) << FRACTION;
const FRACTION_MASK: u64 = (1 << FRACTION) - 1;

/// `EXPONENT_MASKS[e]` selects the exponent bits an `e`-bit exponent cannot hold.
const EXPONENT_MASKS: [u64; EXPONENT] = {
    let mut masks = [0u64; EXPONENT];
    let mut i = 0;
    while i < EXPONENT {
        masks[EXPONENT - i - 1] = ((1 << i) - 1) << (62 - i) as u64;
        i += 1;
    }
    masks
};

/// `FRACTION_MASKS[f]` keeps the top `f` fraction bits.
const FRACTION_MASKS: [u64; FRACTION] = {
    let mut masks = [0u64; FRACTION];
    let mut i = 0;
    while i < FRACTION {
        masks[FRACTION - i - 1] = (!((1 << i) - 1)) & FRACTION_MASK;
        i += 1;
    }
    masks
};

/// A float with `E` exponent bits and `F` fraction bits, stored in an `f64`.
///
/// `E` must be at most 10 and `F` at most 51. Every value is clamped into the
/// narrower format when it is created, so arithmetic behaves as if it were
/// carried out at the reduced precision.
///
/// The IEEE exponent is offset-binary: the top exponent bit is set for
/// non-negative powers. Narrowing therefore saturates in both directions.
/// Large exponents that overflow `E` bits are clamped to the largest
/// representable one, and small exponents are raised to the smallest.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct MaskedFloat<const E: usize, const F: usize> {
    val: f64,
}

impl<const E: usize, const F: usize> MaskedFloat<E, F> {
    pub fn new(val: f64) -> Self {
        val.into()
    }

    pub fn to_f64(self) -> f64 {
        self.val
    }
}

impl<const E: usize, const F: usize> From<MaskedFloat<E, F>> for f64 {
    fn from(masked: MaskedFloat<E, F>) -> Self {
        masked.val
    }
}

impl<const E: usize, const F: usize> From<f64> for MaskedFloat<E, F> {
    fn from(val: f64) -> Self {
        let bits = val.to_bits();
        let sign = bits & (SIGN_MASK | EXPONENT_SIGN_MASK);
        let exp = if bits & EXPONENT_SIGN_MASK != 0 {
            if bits & EXPONENT_MASKS[E] != 0 {
                ((1 << (E + FRACTION)) - 1) & EXPONENT_MASK
            } else {
                bits & EXPONENT_MASK
            }
        } else {
            // Signed zeros pass through.
            if bits & !SIGN_MASK == 0 {
                return Self {
                    val: f64::from_bits(bits & SIGN_MASK),
                };
            }
            if bits & EXPONENT_MASKS[E] != EXPONENT_MASKS[E] {
                EXPONENT_MASKS[E]
            } else {
                bits & EXPONENT_MASK
            }
        };
        let frac = bits & FRACTION_MASKS[F];
        Self {
            val: f64::from_bits(sign | exp | frac),
        }
    }
}

impl<const E: usize, const F: usize> fmt::Display for MaskedFloat<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.val)
    }
}

macro_rules! masked_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<const E: usize, const F: usize> $trait for MaskedFloat<E, F> {
            type Output = Self;

            fn $method(self, other: Self) -> Self {
                (self.val $op other.val).into()
            }
        }
    };
}

masked_binop!(Add, add, +);
masked_binop!(Sub, sub, -);
masked_binop!(Mul, mul, *);
masked_binop!(Div, div, /);

impl<const E: usize, const F: usize> Neg for MaskedFloat<E, F> {
    type Output = Self;

    fn neg(self) -> Self {
        // The format is sign-symmetric; flipping the sign needs no re-masking.
        Self { val: -self.val }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_plus_one() {
        let one = MaskedFloat::<10, 10>::new(1.0);
        let two = MaskedFloat::<10, 10>::new(2.0);
        let epsilon = MaskedFloat::<10, 10>::new(0.001);

        assert!((one + one).to_f64() - 2.0 < 0.001);
        assert!(one + one - two < epsilon);
    }

    #[test]
    fn large_exponents_saturate() {
        let f = f64::powf(2.1, 64.0);
        let too_big = MaskedFloat::<6, 50>::new(f);
        assert!(too_big.to_f64() < f);

        let ok = MaskedFloat::<8, 50>::new(f);
        assert!(ok.to_f64() - f < 0.001);
    }

    #[test]
    fn small_exponents_saturate() {
        let f = f64::powf(2.1, -64.0);
        let too_small = MaskedFloat::<6, 50>::new(f);
        assert!(too_small.to_f64() > f);

        let ok = MaskedFloat::<8, 50>::new(f);
        assert!(ok.to_f64() - f < 0.001);
    }

    #[test]
    fn half_precision_rounds_the_sum() {
        type F16 = MaskedFloat<4, 10>;
        let result = F16::new(65_504.0) + F16::new(34_496.0);
        assert_eq!(result.to_f64(), 100_000.0);
    }

    #[test]
    fn iteration_is_symmetric_in_the_imaginary_axis() {
        // z ← z² + c for c and its conjugate must stay conjugates.
        type T = MaskedFloat<3, 50>;
        let cx = T::new(-1.5);
        let cy = T::new(0.0001);

        let mut z_pos = (cx, cy);
        let mut z_neg = (cx, -cy);

        for _ in 1..50 {
            let rep = z_pos.0 * z_pos.0 - z_pos.1 * z_pos.1 + cx;
            let ren = z_neg.0 * z_neg.0 - z_neg.1 * z_neg.1 + cx;
            let imp = z_pos.0 * z_pos.1 + z_pos.0 * z_pos.1 + cy;
            let imn = z_neg.0 * z_neg.1 + z_neg.0 * z_neg.1 - cy;

            z_pos = (rep, imp);
            z_neg = (ren, imn);

            assert_eq!(z_pos.0.to_f64(), z_neg.0.to_f64());
            assert_eq!(z_pos.1.to_f64(), -z_neg.1.to_f64());
        }
    }

    #[test]
    fn signed_zero() {
        type T = MaskedFloat<3, 50>;

        assert_eq!(T::new(0.0).to_f64().to_bits(), 0.0f64.to_bits());
        assert_eq!(T::new(-0.0).to_f64().to_bits(), (-0.0f64).to_bits());
        assert_eq!((-T::new(0.0)).to_f64().to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn negation_matches_masking_the_negated_value() {
        type T = MaskedFloat<4, 20>;
        for v in [1.0e-9, 3.75, 1.0e30, 0.1] {
            assert_eq!(-T::new(v), T::new(-v));
        }
    }
}
