use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use rf_core::PixelCalculator;

use super::{check_target, row_major_regions, Consumer, Region};
use crate::{
    intermediate::IntermediateImage,
    progress::RefinementValue,
    refinement::{ProgressiveRefinement, RefinementGrid},
    schedule::Schedule,
    Error,
};

/// Paints a progressive refinement: each computed cell fills its whole chunk,
/// and finer passes paint over coarser ones.
pub struct ProgressiveRefinementConsumer {
    image: Arc<IntermediateImage<RefinementValue>>,
    grid: RefinementGrid,
    palette: Box<dyn PixelCalculator>,
    // Pass last painted, and how many of its cells.
    painted: Option<(u32, u64)>,
}

impl ProgressiveRefinementConsumer {
    pub fn new(schedule: &ProgressiveRefinement, palette: &dyn PixelCalculator) -> Self {
        ProgressiveRefinementConsumer {
            image: schedule.image().clone(),
            grid: *schedule.grid(),
            palette: palette.new_instance(),
            painted: None,
        }
    }

    /// Fills the chunks of `cells` of `pass`.
    fn paint_cells(&mut self, target: &mut RgbaImage, pass: u32, cells: std::ops::Range<u64>) {
        let (width, height) = (self.image.width(), self.image.height());
        for k in cells {
            let RefinementValue { x, y, chunk, .. } = self.grid.value_at(pass, k);
            let color = self.palette.color(self.image.get(x, y));
            for py in y..(y + chunk).min(height) {
                for px in x..(x + chunk).min(width) {
                    target.put_pixel(px, py, color);
                }
            }
        }
    }

    /// Repaints every pixel from the finest computed cell covering it.
    fn catch_up(&self, target: &mut RgbaImage, pass: u32, done: u64) {
        let width = self.image.width() as usize;
        if width == 0 || self.image.height() == 0 {
            return;
        }
        let grid = &self.grid;
        let image = self.image.as_ref();
        let palette = self.palette.as_ref();
        let buffer: &mut [u8] = target;
        buffer
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each_init(
                || palette.new_instance(),
                |palette, (y, row)| {
                    for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
                        if let Some(raw) = ancestor(grid, image, pass, done, x as u32, y as u32) {
                            pixel.copy_from_slice(&palette.color(raw).0);
                        }
                    }
                },
            );
    }

    /// How far through the whole refinement `value` is, as a fraction.
    fn fraction(&self, value: RefinementValue) -> (u128, u128) {
        let steps = self.grid.steps() as u128;
        let (pass, k) = self.grid.position(value);
        let cells = self.grid.cells(pass) as u128;
        if k as u128 >= cells {
            (pass as u128 + 1, steps)
        } else {
            (pass as u128 * cells + k as u128, steps * cells)
        }
    }
}

/// The raw value for pixel `(x, y)` when `done` cells of `pass` are computed,
/// along with every earlier pass.
fn ancestor(
    grid: &RefinementGrid,
    image: &IntermediateImage<RefinementValue>,
    pass: u32,
    done: u64,
    x: u32,
    y: u32,
) -> Option<i32> {
    let chunk = grid.chunk(pass);
    let (cx, cy) = (x - x % chunk, y - y % chunk);
    let cell = (cy / chunk) as u64 * grid.columns(pass) as u64 + (cx / chunk) as u64;
    if cell < done {
        return Some(image.get(cx, cy));
    }
    if pass == 0 {
        return None;
    }
    let parent = chunk * 2;
    Some(image.get(x - x % parent, y - y % parent))
}

impl Consumer for ProgressiveRefinementConsumer {
    fn consume(&mut self, target: &mut RgbaImage) -> Result<bool, Error> {
        check_target(target, self.image.width(), self.image.height())?;
        let (pass, done) = self.grid.position(self.image.min_progress());
        let previous = self.painted;
        let painted = match previous {
            Some((p, before)) if p == pass => {
                if done <= before {
                    return Ok(false);
                }
                self.paint_cells(target, pass, before..done);
                true
            }
            Some((p, before)) if p + 1 == pass => {
                self.paint_cells(target, p, before..self.grid.cells(p));
                self.paint_cells(target, pass, 0..done);
                true
            }
            previous => {
                tracing::debug!(?previous, pass, done, "repainting");
                self.catch_up(target, pass, done);
                pass > 0 || done > 0
            }
        };
        self.painted = Some((pass, done));
        Ok(painted)
    }

    fn percentages(&self) -> Vec<u32> {
        self.image
            .all_progress()
            .iter()
            .map(|progress| {
                let (start, start_of) = self.fraction(progress.initial());
                let (now, now_of) = self.fraction(progress.get());
                let remaining = start_of - start;
                if remaining == 0 {
                    return 100;
                }
                // (now/now_of - start/start_of) / (remaining/start_of)
                let done = (now * start_of).saturating_sub(start * now_of);
                (100 * done / (now_of * remaining)).min(100) as u32
            })
            .collect()
    }

    fn available_regions(&self) -> Vec<Region> {
        let (width, height) = (self.image.width(), self.image.height());
        match self.painted {
            None => Vec::new(),
            Some((pass, done)) if pass == 0 && done < self.grid.cells(0) => row_major_regions(
                done,
                self.grid.columns(0),
                self.grid.chunk(0),
                width,
                height,
            ),
            Some(_) => [Region::new(0, 0, width, height)]
                .into_iter()
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    fn is_complete(&self) -> bool {
        self.image.is_complete()
    }
}
