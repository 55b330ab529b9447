use std::marker::PhantomData;

use crate::{
    complex::Complex,
    decimal::Decimal,
    number::{Number, NumberError},
    real::Real,
};

/// Constructs values of one representation for formulas and transforms.
pub trait NumberFactory<V>: Send + Sync {
    fn zero(&self) -> Real<V>;

    fn one(&self) -> Real<V>;

    /// A small integer constant.
    fn constant(&self, value: i32) -> Real<V>;

    fn real(&self, value: &Decimal) -> Result<Real<V>, NumberError>;

    fn complex(&self, re: &Decimal, im: &Decimal) -> Result<Complex<V>, NumberError>;

    fn parse_real(&self, text: &str) -> Result<Real<V>, NumberError> {
        self.real(&text.parse()?)
    }
}

/// The factory for any [`Number`], built from its own conversions.
pub struct StandardFactory<V> {
    _representation: PhantomData<fn() -> V>,
}

impl<V> StandardFactory<V> {
    pub fn new() -> Self {
        StandardFactory {
            _representation: PhantomData,
        }
    }
}

impl<V> Default for StandardFactory<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Number> NumberFactory<V> for StandardFactory<V> {
    fn zero(&self) -> Real<V> {
        Real::zero()
    }

    fn one(&self) -> Real<V> {
        Real::one()
    }

    fn constant(&self, value: i32) -> Real<V> {
        Real::from_i32(value)
    }

    fn real(&self, value: &Decimal) -> Result<Real<V>, NumberError> {
        Ok(Real::new(V::from_decimal(value)?))
    }

    fn complex(&self, re: &Decimal, im: &Decimal) -> Result<Complex<V>, NumberError> {
        Ok(Complex::new(V::from_decimal(re)?, V::from_decimal(im)?))
    }
}
