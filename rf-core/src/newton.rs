// Newton's method on z^3 - 1.
use crate::{
    complex::Complex,
    factory::NumberFactory,
    formula::{Formula, FormulaError},
    number::Number,
};

/// Convergence threshold on `|f(z)|²`.
const TOLERANCE_SQUARED: &str = "1e-10";

/// Newton's fractal for `f(z) = z³ − 1`.
///
/// The orbit "escapes" when it has converged onto a root, so the iteration
/// count is the number of Newton steps taken. A point whose derivative
/// vanishes (the origin) fails with a division by zero.
pub struct Newton<V> {
    one: Option<Complex<V>>,
    three: Option<Complex<V>>,
    tolerance: Option<V>,
    z: Option<Complex<V>>,
    converged: bool,
}

impl<V: Number> Newton<V> {
    pub fn new() -> Self {
        Newton {
            one: None,
            three: None,
            tolerance: None,
            z: None,
            converged: false,
        }
    }
}

impl<V: Number> Default for Newton<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Number> Formula<V> for Newton<V> {
    fn name(&self) -> &str {
        "newton"
    }

    fn new_instance(&self) -> Box<dyn Formula<V>> {
        Box::new(Newton::new())
    }

    fn cache_constants(&mut self, factory: &dyn NumberFactory<V>) -> Result<(), FormulaError> {
        self.one = Some(Complex::from_real(factory.one().into_inner()));
        self.three = Some(Complex::from_real(factory.constant(3).into_inner()));
        self.tolerance = Some(factory.parse_real(TOLERANCE_SQUARED)?.into_inner());
        Ok(())
    }

    /// Newton's fractal has no Julia form.
    fn set_julia_point(&mut self, _point: Option<Complex<V>>) {}

    fn init(&mut self, point: &Complex<V>) {
        self.z = Some(point.clone());
        self.converged = false;
    }

    fn step(&mut self) -> Result<(), FormulaError> {
        let (z, one, three, tolerance) = match (&self.z, &self.one, &self.three, &self.tolerance) {
            (Some(z), Some(one), Some(three), Some(tolerance)) => (z, one, three, tolerance),
            _ => return Err(FormulaError::NotPrimed),
        };
        if self.converged {
            return Ok(());
        }
        // z ← z − f(z)/f'(z), with f'(z) = 3z².
        let square = z.square();
        let f = square.clone() * z.clone() - one.clone();
        if f.abs_squared() < *tolerance {
            self.converged = true;
            return Ok(());
        }
        let derivative = three.clone() * square;
        let delta = f.divide(&derivative)?;
        self.z = Some(z.clone() - delta);
        Ok(())
    }

    fn escaped(&self) -> bool {
        self.converged
    }

    fn z(&self) -> Option<&Complex<V>> {
        self.z.as_ref()
    }
}
