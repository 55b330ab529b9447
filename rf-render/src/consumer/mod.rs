//! Readers that turn the computed part of an image into pixels.
//!
//! A consumer only reads pixels that the minimum checkpoint covers, so it can
//! run on its own thread while producers write, without locks.

use image::RgbaImage;

use crate::Error;

mod refinement;
mod scan;

pub use refinement::ProgressiveRefinementConsumer;
pub use scan::RasterScanConsumer;

/// A rectangle of pixels, in image coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Region {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

pub trait Consumer {
    /// Paints newly available pixels into `target`, which must be the size of
    /// the image. Returns whether anything was painted.
    fn consume(&mut self, target: &mut RgbaImage) -> Result<bool, Error>;

    /// Per-worker completion, 0 to 100.
    fn percentages(&self) -> Vec<u32>;

    /// Rectangles of `target` that hold painted pixels.
    fn available_regions(&self) -> Vec<Region>;

    fn is_complete(&self) -> bool;
}

fn check_target(target: &RgbaImage, width: u32, height: u32) -> Result<(), Error> {
    if target.dimensions() != (width, height) {
        let (w, h) = target.dimensions();
        return Err(Error::InvalidArgument(format!(
            "cannot paint a {width}x{height} image into a {w}x{h} bitmap"
        )));
    }
    Ok(())
}

/// Regions covering the first `cells` cells of a `columns`-wide grid with
/// spacing `chunk`, clipped to `width × height`.
fn row_major_regions(
    cells: u64,
    columns: u32,
    chunk: u32,
    width: u32,
    height: u32,
) -> Vec<Region> {
    if columns == 0 {
        return Vec::new();
    }
    let full_rows = (cells / columns as u64) as u32;
    let partial = (cells % columns as u64) as u32;
    let top = (full_rows * chunk).min(height);
    let regions = [
        Region::new(0, 0, width, top),
        Region::new(
            0,
            top,
            (partial * chunk).min(width),
            chunk.min(height - top),
        ),
    ];
    regions.into_iter().filter(|r| !r.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_of_a_prefix() {
        assert_eq!(
            row_major_regions(7, 3, 2, 5, 5),
            [Region::new(0, 0, 5, 4), Region::new(0, 4, 2, 1)]
        );
        assert_eq!(row_major_regions(6, 3, 1, 3, 2), [Region::new(0, 0, 3, 2)]);
        assert!(row_major_regions(0, 3, 1, 3, 2).is_empty());
        assert!(row_major_regions(4, 0, 1, 0, 2).is_empty());
    }

    #[test]
    fn target_must_match() {
        let target = RgbaImage::new(3, 2);
        assert!(check_target(&target, 3, 2).is_ok());
        assert!(check_target(&target, 2, 3).is_err());
    }
}
