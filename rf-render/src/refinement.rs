//! Multi-resolution scheduling.
//!
//! Pass `p` of `steps` samples the image on a grid with spacing
//! `2^(steps - 1 - p)`, so the last pass computes every pixel. Cells of a pass
//! are numbered row-major and dealt round-robin: cell `k` belongs to worker
//! `k % N`. Workers rendezvous at a barrier between passes so that the slowest
//! checkpoint always bounds a fully-computed prefix.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::{
    barrier::CyclicBarrier,
    intermediate::IntermediateImage,
    progress::{Progress, RefinementValue, MAX_REFINEMENT_DIMENSION},
    schedule::{PointFailure, PointTask, RunState, Schedule},
    Error,
};

/// Most passes a refinement may have.
pub const MAX_STEPS: u32 = 16;

/// Geometry of the passes: which cell is where, and who owns it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RefinementGrid {
    width: u32,
    height: u32,
    steps: u32,
    workers: u32,
}

impl RefinementGrid {
    pub fn new(width: u32, height: u32, steps: u32, workers: usize) -> Result<Self, Error> {
        if !(1..=MAX_STEPS).contains(&steps) {
            return Err(Error::InvalidArgument(format!(
                "refinement steps must be in 1..={MAX_STEPS}, not {steps}"
            )));
        }
        if width > MAX_REFINEMENT_DIMENSION || height > MAX_REFINEMENT_DIMENSION {
            return Err(Error::InvalidArgument(format!(
                "{width}x{height} is too large to refine"
            )));
        }
        if workers == 0 || workers > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "cannot refine with {workers} workers"
            )));
        }
        Ok(RefinementGrid {
            width,
            height,
            steps,
            workers: workers as u32,
        })
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn chunk(&self, pass: u32) -> u32 {
        1 << (self.steps - 1 - pass)
    }

    pub fn columns(&self, pass: u32) -> u32 {
        div_ceil(self.width, self.chunk(pass))
    }

    pub fn rows(&self, pass: u32) -> u32 {
        div_ceil(self.height, self.chunk(pass))
    }

    pub fn cells(&self, pass: u32) -> u64 {
        self.columns(pass) as u64 * self.rows(pass) as u64
    }

    pub fn owner(&self, cell: u64) -> u32 {
        (cell % self.workers as u64) as u32
    }

    /// The checkpoint naming cell `k` of `pass`, or the end of the pass when
    /// `k` is past the last cell.
    pub fn value_at(&self, pass: u32, k: u64) -> RefinementValue {
        let chunk = self.chunk(pass);
        let cells = self.cells(pass);
        if k >= cells {
            return RefinementValue::new(
                self.owner(cells) as u16,
                0,
                self.rows(pass) * chunk,
                chunk,
            );
        }
        let columns = self.columns(pass) as u64;
        RefinementValue::new(
            self.owner(k) as u16,
            (k % columns) as u32 * chunk,
            (k / columns) as u32 * chunk,
            chunk,
        )
    }

    pub fn end_of_pass(&self, pass: u32) -> RefinementValue {
        self.value_at(pass, self.cells(pass))
    }

    /// Where every worker stops: past the last cell of the finest pass.
    pub fn final_value(&self) -> RefinementValue {
        self.end_of_pass(self.steps - 1)
    }

    pub fn first_owned(&self, pass: u32, worker: usize) -> RefinementValue {
        self.value_at(pass, worker as u64)
    }

    /// The checkpoint after `worker` finishes cell `k` of `pass`.
    pub fn next_owned(&self, pass: u32, k: u64) -> RefinementValue {
        self.value_at(pass, k + self.workers as u64)
    }

    /// Pass and cell index of a checkpoint; the end of a pass has index
    /// `cells(pass)`.
    ///
    /// The value must be one this grid produced; see [`RefinementGrid::locate`]
    /// for untrusted values.
    pub fn position(&self, value: RefinementValue) -> (u32, u64) {
        let level = value.chunk.trailing_zeros();
        let pass = (self.steps - 1).saturating_sub(level);
        let chunk = self.chunk(pass);
        let row = (value.y / chunk) as u64;
        let column = (value.x / chunk) as u64;
        let k = row * self.columns(pass) as u64 + column;
        (pass, k.min(self.cells(pass)))
    }

    /// Like [`RefinementGrid::position`], but `None` unless the value is a
    /// cell or pass end of this grid.
    pub fn locate(&self, value: RefinementValue) -> Option<(u32, u64)> {
        if !value.chunk.is_power_of_two() || value.chunk > self.chunk(0) {
            return None;
        }
        let (pass, k) = self.position(value);
        if self.value_at(pass, k) == value {
            Some((pass, k))
        } else {
            None
        }
    }

    fn initial(&self, worker: usize) -> RefinementValue {
        self.first_owned(0, worker)
    }
}

fn div_ceil(n: u32, d: u32) -> u32 {
    (n + d - 1) / d
}

/// Coarse-to-fine scheduling with a rendezvous between passes.
#[derive(Debug)]
pub struct ProgressiveRefinement {
    image: Arc<IntermediateImage<RefinementValue>>,
    grid: RefinementGrid,
    barrier: CyclicBarrier,
    // Passes before this one are finished by everybody; no need to meet there.
    rendezvous_from: AtomicU32,
}

impl ProgressiveRefinement {
    pub fn new(width: u32, height: u32, steps: u32, workers: usize) -> Result<Self, Error> {
        let grid = RefinementGrid::new(width, height, steps, workers)?;
        let progress = (0..workers)
            .map(|i| Progress::new(grid.initial(i), grid.final_value()))
            .collect();
        let image = IntermediateImage::new(width, height, progress)?;
        tracing::debug!(width, height, steps, workers, "planned progressive refinement");
        Ok(ProgressiveRefinement {
            image: Arc::new(image),
            grid,
            barrier: CyclicBarrier::new(workers),
            rendezvous_from: AtomicU32::new(0),
        })
    }

    pub fn grid(&self) -> &RefinementGrid {
        &self.grid
    }
}

impl Schedule for ProgressiveRefinement {
    type Value = RefinementValue;

    fn image(&self) -> &Arc<IntermediateImage<RefinementValue>> {
        &self.image
    }

    fn prepare(&self) {
        self.barrier.reset();
        let (pass, k) = self.grid.position(self.image.min_progress());
        let from = if k >= self.grid.cells(pass) {
            pass + 1
        } else {
            pass
        };
        self.rendezvous_from.store(from, Ordering::Release);
        tracing::debug!(pass, from, "planned rendezvous");
    }

    fn compute(&self, worker: usize, task: &mut dyn PointTask) -> Result<RunState, PointFailure> {
        let progress = self.image.progress(worker);
        let final_value = self.grid.final_value();
        let _span = tracing::debug_span!("progressive refinement", worker).entered();
        loop {
            let current = progress.get();
            if current == final_value {
                return Ok(RunState::Complete);
            }
            if task.interrupted() {
                tracing::debug!(?current, "interrupted");
                return Ok(RunState::Interrupted);
            }
            let (pass, k) = self.grid.position(current);
            if k >= self.grid.cells(pass) {
                if pass >= self.rendezvous_from.load(Ordering::Acquire) {
                    if let Err(error) = self.barrier.wait() {
                        tracing::debug!(pass, %error, "left the rendezvous");
                        return Ok(RunState::Interrupted);
                    }
                }
                tracing::debug!(pass, "pass finished");
                progress.set(self.grid.first_owned(pass + 1, worker));
                continue;
            }
            let (x, y) = (current.x, current.y);
            let value = task
                .evaluate(x, y)
                .map_err(|source| PointFailure { worker, x, y, source })?;
            self.image.set(x, y, value);
            progress.set(self.grid.next_owned(pass, k));
        }
    }

    fn skip(&self, worker: usize) {
        let progress = self.image.progress(worker);
        let (pass, k) = self.grid.position(progress.get());
        if k < self.grid.cells(pass) {
            progress.set(self.grid.next_owned(pass, k));
        }
    }

    fn abandon(&self) {
        self.barrier.break_barrier();
    }
}
