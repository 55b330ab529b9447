use std::sync::Arc;

use image::RgbaImage;
use rf_core::PixelCalculator;

use super::{check_target, row_major_regions, Consumer, Region};
use crate::{
    intermediate::IntermediateImage, progress::ScanIndex, scan::RasterScan, schedule::Schedule,
    Error,
};

/// Paints a raster scan in index order, up to the slowest worker.
pub struct RasterScanConsumer {
    image: Arc<IntermediateImage<ScanIndex>>,
    palette: Box<dyn PixelCalculator>,
    painted: u64,
}

impl RasterScanConsumer {
    pub fn new(schedule: &RasterScan, palette: &dyn PixelCalculator) -> Self {
        RasterScanConsumer {
            image: schedule.image().clone(),
            palette: palette.new_instance(),
            painted: 0,
        }
    }

    /// Every index below this is computed.
    fn boundary(&self) -> u64 {
        self.image.min_progress().0.min(self.image.len() as u64)
    }
}

impl Consumer for RasterScanConsumer {
    fn consume(&mut self, target: &mut RgbaImage) -> Result<bool, Error> {
        check_target(target, self.image.width(), self.image.height())?;
        let boundary = self.boundary();
        if boundary <= self.painted {
            return Ok(false);
        }
        let width = self.image.width() as u64;
        for index in self.painted..boundary {
            let raw = self.image.get_index(index as usize);
            let (x, y) = ((index % width) as u32, (index / width) as u32);
            target.put_pixel(x, y, self.palette.color(raw));
        }
        tracing::trace!(from = self.painted, to = boundary, "painted scan");
        self.painted = boundary;
        Ok(true)
    }

    fn percentages(&self) -> Vec<u32> {
        self.image
            .all_progress()
            .iter()
            .map(|progress| {
                let (initial, last) = (progress.initial().0, progress.final_value().0);
                if last <= initial {
                    return 100;
                }
                let done = progress.get().0.clamp(initial, last) - initial;
                (done * 100 / (last - initial)) as u32
            })
            .collect()
    }

    fn available_regions(&self) -> Vec<Region> {
        let (width, height) = (self.image.width(), self.image.height());
        row_major_regions(self.painted, width, 1, width, height)
    }

    fn is_complete(&self) -> bool {
        self.image.is_complete()
    }
}
