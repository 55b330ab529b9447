use std::sync::Arc;

use crate::{
    intermediate::IntermediateImage,
    progress::{Progress, ScanIndex},
    schedule::{PointFailure, PointTask, RunState, Schedule},
    Error,
};

/// Row-major scan, interleaved: worker `i` of `N` computes pixels
/// `i, i + N, i + 2N, ...`.
#[derive(Debug)]
pub struct RasterScan {
    image: Arc<IntermediateImage<ScanIndex>>,
}

impl RasterScan {
    pub fn new(width: u32, height: u32, workers: usize) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::InvalidArgument("need at least one worker".to_owned()));
        }
        let len = width as u64 * height as u64;
        let progress = (0..workers as u64)
            .map(|i| {
                let (initial, final_value) = partition(len, workers as u64, i);
                Progress::new(ScanIndex(initial), ScanIndex(final_value))
            })
            .collect();
        let image = IntermediateImage::new(width, height, progress)?;
        tracing::debug!(width, height, workers, "planned raster scan");
        Ok(RasterScan {
            image: Arc::new(image),
        })
    }

    pub fn stride(&self) -> u64 {
        self.image.workers() as u64
    }
}

/// The first index worker `i` computes and the value it stops at.
///
/// Every final value lies in `[len, len + N)`, one stride past the last point
/// the worker owns.
pub(crate) fn partition(len: u64, workers: u64, i: u64) -> (u64, u64) {
    let count = if i >= len {
        0
    } else {
        (len - i + workers - 1) / workers
    };
    (i, i + count * workers)
}

impl Schedule for RasterScan {
    type Value = ScanIndex;

    fn image(&self) -> &Arc<IntermediateImage<ScanIndex>> {
        &self.image
    }

    fn compute(&self, worker: usize, task: &mut dyn PointTask) -> Result<RunState, PointFailure> {
        let progress = self.image.progress(worker);
        let width = self.image.width() as u64;
        let stride = self.stride();
        let _span = tracing::debug_span!("raster scan", worker).entered();
        loop {
            let ScanIndex(index) = progress.get();
            if index >= progress.final_value().0 {
                return Ok(RunState::Complete);
            }
            if task.interrupted() {
                tracing::debug!(index, "interrupted");
                return Ok(RunState::Interrupted);
            }
            let (x, y) = ((index % width) as u32, (index / width) as u32);
            let value = task
                .evaluate(x, y)
                .map_err(|source| PointFailure { worker, x, y, source })?;
            self.image.set_index(index as usize, value);
            progress.set(ScanIndex(index + stride));
        }
    }

    fn skip(&self, worker: usize) {
        let progress = self.image.progress(worker);
        let ScanIndex(index) = progress.get();
        if index < progress.final_value().0 {
            progress.set(ScanIndex(index + self.stride()));
        }
    }
}
