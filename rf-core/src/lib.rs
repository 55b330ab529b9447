//! Numeric tower and formula plugins for Refract.
//!
//! Everything here is a value type or a per-worker strategy; nothing in this
//! crate knows about threads or scheduling.

mod algebra;
pub mod big_fixed;
pub mod binary_fixed;
pub mod complex;
pub mod decimal;
pub mod factory;
pub mod formula;
pub mod mandelbrot;
pub mod masked_float;
pub mod newton;
pub mod number;
pub mod palette;
pub mod point;
pub mod real;
pub mod registry;
mod series;
pub mod transform;

pub use big_fixed::BigFixed;
pub use binary_fixed::BinaryFixed;
pub use complex::Complex;
pub use decimal::{Decimal, DecimalError};
pub use factory::{NumberFactory, StandardFactory};
pub use formula::{Formula, FormulaError};
pub use masked_float::MaskedFloat;
pub use number::{Number, NumberError};
pub use palette::{HuePalette, PixelCalculator};
pub use point::{EscapeTime, PointCalculator, NOT_ESCAPED};
pub use real::Real;
pub use registry::{Registry, UnknownPlugin};
pub use transform::{CoordinateTransform, Viewport};
