use crate::{
    formula::{Formula, FormulaError},
    transform::CoordinateTransform,
};

/// Raw value stored for a point that never escaped.
pub const NOT_ESCAPED: i32 = -1;

/// Turns one pixel into the raw value stored in the image.
pub trait PointCalculator<V>: Send {
    /// A fresh instance for another worker.
    fn new_instance(&self) -> Box<dyn PointCalculator<V>>;

    fn compute(
        &mut self,
        x: u32,
        y: u32,
        transform: &dyn CoordinateTransform<V>,
        formula: &mut dyn Formula<V>,
    ) -> Result<i32, FormulaError>;
}

/// The step on which the orbit escaped, or [`NOT_ESCAPED`].
#[derive(Copy, Clone, Debug)]
pub struct EscapeTime {
    limit: u32,
}

impl EscapeTime {
    pub fn new(limit: u32) -> Self {
        // Counts are stored as i32.
        EscapeTime {
            limit: limit.min(i32::MAX as u32),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl<V: 'static> PointCalculator<V> for EscapeTime {
    fn new_instance(&self) -> Box<dyn PointCalculator<V>> {
        Box::new(*self)
    }

    fn compute(
        &mut self,
        x: u32,
        y: u32,
        transform: &dyn CoordinateTransform<V>,
        formula: &mut dyn Formula<V>,
    ) -> Result<i32, FormulaError> {
        let point = transform
            .point(x, y)
            .ok_or(FormulaError::OutsideViewport { x, y })?;
        formula.init(&point);
        for i in 0..self.limit {
            formula.step()?;
            if formula.escaped() {
                return Ok(i as i32);
            }
        }
        Ok(NOT_ESCAPED)
    }
}
