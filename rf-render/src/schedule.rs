use std::sync::Arc;

use rf_core::FormulaError;
use thiserror::Error;

use crate::{intermediate::IntermediateImage, progress::ProgressValue};

/// How a call to [`Schedule::compute`] ended, other than by a failed point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Complete,
    Interrupted,
}

/// The per-worker half of a computation: evaluates single pixels.
pub trait PointTask {
    /// Checked before each point.
    fn interrupted(&self) -> bool;

    fn evaluate(&mut self, x: u32, y: u32) -> Result<i32, FormulaError>;
}

/// A point that could not be computed. The worker's checkpoint still names it.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("worker {worker} failed at pixel ({x}, {y})")]
pub struct PointFailure {
    pub worker: usize,
    pub x: u32,
    pub y: u32,
    #[source]
    pub source: FormulaError,
}

/// Decides which pixels each worker computes, and in what order.
pub trait Schedule: Send + Sync + 'static {
    type Value: ProgressValue;

    fn image(&self) -> &Arc<IntermediateImage<Self::Value>>;

    fn workers(&self) -> usize {
        self.image().workers()
    }

    /// Called before workers are (re)started, with none running.
    fn prepare(&self) {}

    /// Computes from `worker`'s checkpoint until it completes, is interrupted
    /// or a point fails.
    fn compute(&self, worker: usize, task: &mut dyn PointTask) -> Result<RunState, PointFailure>;

    /// Moves `worker` past the point its checkpoint names, leaving the pixel
    /// as it was.
    fn skip(&self, worker: usize);

    /// Releases anyone waiting on a worker that will not come back.
    fn abandon(&self) {}
}
