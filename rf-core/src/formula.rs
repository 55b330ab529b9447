use thiserror::Error;

use crate::{complex::Complex, factory::NumberFactory, number::NumberError};

/// Errors raised while evaluating a formula at one point.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Number(#[from] NumberError),
    #[error("formula stepped before its constants were cached")]
    NotPrimed,
    #[error("pixel ({x}, {y}) is outside the viewport")]
    OutsideViewport { x: u32, y: u32 },
}

/// An iterated function of the complex plane.
///
/// Instances are mutable: they cache per-run constants and hold the current
/// orbit. Each worker therefore owns its own instance, made with
/// [`Formula::new_instance`].
pub trait Formula<V>: Send {
    fn name(&self) -> &str;

    /// A fresh instance with the same configuration and nothing cached.
    fn new_instance(&self) -> Box<dyn Formula<V>>;

    /// Builds the constants the iteration needs from the run's factory.
    fn cache_constants(&mut self, factory: &dyn NumberFactory<V>) -> Result<(), FormulaError>;

    /// Switches between the parameter-plane form (`None`) and the Julia set
    /// for a fixed constant.
    fn set_julia_point(&mut self, point: Option<Complex<V>>);

    /// Starts a new orbit for the pixel at `point`.
    fn init(&mut self, point: &Complex<V>);

    fn step(&mut self) -> Result<(), FormulaError>;

    /// Whether the orbit has reached its stopping condition.
    fn escaped(&self) -> bool;

    /// The current orbit value, once `init` has been called.
    fn z(&self) -> Option<&Complex<V>>;
}
