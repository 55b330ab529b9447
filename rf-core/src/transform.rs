use std::ops::Range;

use num::BigRational;

use crate::{
    complex::Complex,
    decimal::Decimal,
    number::{Number, NumberError},
};

/// Maps pixels of a raster onto the complex plane.
pub trait CoordinateTransform<V>: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// The point for pixel `(x, y)`, or `None` outside the raster.
    fn point(&self, x: u32, y: u32) -> Option<Complex<V>>;
}

/// A rectangle of the plane sampled at pixel centers.
///
/// Column `i` is at `x.start + (i + ½)·(x.end − x.start)/width`, and likewise
/// row `j` from `y.start`. Coordinates are computed exactly from the corner
/// decimals and converted into the representation once per row and column.
pub struct Viewport<V> {
    x: Range<Decimal>,
    y: Range<Decimal>,
    xs: Vec<V>,
    ys: Vec<V>,
}

impl<V: Number> Viewport<V> {
    pub fn new(
        x: Range<Decimal>,
        y: Range<Decimal>,
        width: u32,
        height: u32,
    ) -> Result<Self, NumberError> {
        let xs = sample(&x, width)?;
        let ys = sample(&y, height)?;
        tracing::debug!(x = ?x, y = ?y, width, height, "sampled viewport");
        Ok(Viewport { x, y, xs, ys })
    }

    pub fn x_range(&self) -> &Range<Decimal> {
        &self.x
    }

    pub fn y_range(&self) -> &Range<Decimal> {
        &self.y
    }
}

fn sample<V: Number>(range: &Range<Decimal>, steps: u32) -> Result<Vec<V>, NumberError> {
    if steps == 0 {
        return Ok(Vec::new());
    }
    let start = range.start.to_rational()?;
    let end = range.end.to_rational()?;
    let step = (end - &start) / BigRational::from_integer(steps.into());
    let mut next = start + &step / BigRational::from_integer(2.into());
    let mut results = Vec::with_capacity(steps as usize);
    for _ in 0..steps {
        results.push(V::from_bigrational(&next)?);
        next += &step;
    }
    Ok(results)
}

impl<V: Number> CoordinateTransform<V> for Viewport<V> {
    fn width(&self) -> u32 {
        self.xs.len() as u32
    }

    fn height(&self) -> u32 {
        self.ys.len() as u32
    }

    fn point(&self, x: u32, y: u32) -> Option<Complex<V>> {
        let re = self.xs.get(x as usize)?;
        let im = self.ys.get(y as usize)?;
        Some(Complex::new(re.clone(), im.clone()))
    }
}
