//! The Mandelbrot set and its higher-degree relatives.

use crate::{
    complex::Complex,
    factory::NumberFactory,
    formula::{Formula, FormulaError},
    number::Number,
};

/// Bailout radius, squared.
const BAILOUT_SQUARED: i32 = 4;

/// `z ← z^n + c`.
///
/// Without a Julia point, `z` starts at zero and `c` is the pixel. With one,
/// `z` starts at the pixel and `c` is the Julia point.
pub struct Mandelbrot<V> {
    name: String,
    exponent: i32,
    julia: Option<Complex<V>>,
    bailout: Option<V>,
    z: Option<Complex<V>>,
    c: Option<Complex<V>>,
}

impl<V: Number> Mandelbrot<V> {
    /// The classic set, `z² + c`.
    pub fn new() -> Self {
        Self::multibrot(2)
    }

    /// `z^exponent + c`; `exponent` is at least 2.
    pub fn multibrot(exponent: i32) -> Self {
        let exponent = exponent.max(2);
        let name = match exponent {
            2 => "mandelbrot".to_owned(),
            n => format!("multibrot{}", n),
        };
        Mandelbrot {
            name,
            exponent,
            julia: None,
            bailout: None,
            z: None,
            c: None,
        }
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }
}

impl<V: Number> Default for Mandelbrot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Number> Formula<V> for Mandelbrot<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_instance(&self) -> Box<dyn Formula<V>> {
        Box::new(Mandelbrot {
            name: self.name.clone(),
            exponent: self.exponent,
            julia: self.julia.clone(),
            bailout: None,
            z: None,
            c: None,
        })
    }

    fn cache_constants(&mut self, factory: &dyn NumberFactory<V>) -> Result<(), FormulaError> {
        self.bailout = Some(factory.constant(BAILOUT_SQUARED).into_inner());
        Ok(())
    }

    fn set_julia_point(&mut self, point: Option<Complex<V>>) {
        self.julia = point;
    }

    fn init(&mut self, point: &Complex<V>) {
        match &self.julia {
            Some(julia) => {
                self.z = Some(point.clone());
                self.c = Some(julia.clone());
            }
            None => {
                self.z = Some(Complex::zero());
                self.c = Some(point.clone());
            }
        }
    }

    fn step(&mut self) -> Result<(), FormulaError> {
        let (z, c) = match (&self.z, &self.c) {
            (Some(z), Some(c)) if self.bailout.is_some() => (z, c),
            _ => return Err(FormulaError::NotPrimed),
        };
        let power = if self.exponent == 2 {
            z.square()
        } else {
            z.to_the(self.exponent)?
        };
        self.z = Some(power + c.clone());
        Ok(())
    }

    fn escaped(&self) -> bool {
        match (&self.z, &self.bailout) {
            // The escape condition is |z| ≥ 2; compare |z|² to 4 instead.
            (Some(z), Some(bailout)) => z.abs_squared() >= *bailout,
            _ => false,
        }
    }

    fn z(&self) -> Option<&Complex<V>> {
        self.z.as_ref()
    }
}
