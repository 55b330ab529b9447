use std::{
    io::{self, Read, Write},
    sync::atomic::{AtomicI32, Ordering},
};

use crate::{
    progress::{Progress, ProgressValue},
    Error,
};

/// The shared raw-value raster, plus one checkpoint per worker.
///
/// Pixels are written by exactly one worker each and are only read once a
/// checkpoint covers them, so pixel accesses are relaxed; the ordering comes
/// from the [`Progress`] slots.
#[derive(Debug)]
pub struct IntermediateImage<P> {
    width: u32,
    height: u32,
    progress: Box<[Progress<P>]>,
    values: Box<[AtomicI32]>,
}

impl<P: ProgressValue> IntermediateImage<P> {
    /// An image of zeroes with one progress slot per worker.
    pub fn new(width: u32, height: u32, progress: Vec<Progress<P>>) -> Result<Self, Error> {
        if progress.is_empty() {
            return Err(Error::InvalidArgument(
                "an image needs at least one worker".to_owned(),
            ));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| Error::InvalidArgument(format!("{width}x{height} is too large")))?;
        let values = (0..len).map(|_| AtomicI32::new(0)).collect();
        Ok(IntermediateImage {
            width,
            height,
            progress: progress.into_boxed_slice(),
            values,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn workers(&self) -> usize {
        self.progress.len()
    }

    pub fn progress(&self, worker: usize) -> &Progress<P> {
        &self.progress[worker]
    }

    pub fn all_progress(&self) -> &[Progress<P>] {
        &self.progress
    }

    /// The slowest worker's checkpoint.
    pub fn min_progress(&self) -> P {
        self.progress
            .iter()
            .map(Progress::get)
            .min()
            .unwrap_or_else(|| self.progress[0].initial())
    }

    pub fn is_complete(&self) -> bool {
        self.progress.iter().all(Progress::is_complete)
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.get_index(self.index(x, y))
    }

    pub fn set(&self, x: u32, y: u32, value: i32) {
        self.set_index(self.index(x, y), value)
    }

    pub fn get_index(&self, index: usize) -> i32 {
        self.values[index].load(Ordering::Relaxed)
    }

    pub fn set_index(&self, index: usize, value: i32) {
        self.values[index].store(value, Ordering::Relaxed)
    }

    /// Writes one pixel as a big-endian i32.
    pub fn write_point(&self, index: usize, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.get_index(index).to_be_bytes())
    }

    /// Reads one big-endian i32; the caller decides where it goes.
    pub fn read_point(input: &mut dyn Read) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        input.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ScanIndex;

    fn slots(n: u64) -> Vec<Progress<ScanIndex>> {
        (0..n)
            .map(|i| Progress::new(ScanIndex(i), ScanIndex(i + 10)))
            .collect()
    }

    #[test]
    fn needs_a_worker() {
        assert!(matches!(
            IntermediateImage::<ScanIndex>::new(2, 2, Vec::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn pixels_start_at_zero() {
        let image = IntermediateImage::new(3, 2, slots(2)).unwrap();
        assert_eq!(image.len(), 6);
        assert_eq!(image.workers(), 2);
        assert!((0..6).all(|i| image.get_index(i) == 0));
        image.set(2, 1, 7);
        assert_eq!(image.get_index(5), 7);
        assert_eq!(image.get(2, 1), 7);
    }

    #[test]
    fn minimum_is_the_slowest_worker() {
        let image = IntermediateImage::new(4, 4, slots(3)).unwrap();
        image.progress(0).set(ScanIndex(9));
        image.progress(2).set(ScanIndex(5));
        assert_eq!(image.min_progress(), ScanIndex(1));
        image.progress(1).set(ScanIndex(4));
        assert_eq!(image.min_progress(), ScanIndex(4));
        assert!(!image.is_complete());
    }

    #[test]
    fn points_are_big_endian() {
        let image = IntermediateImage::new(2, 1, slots(1)).unwrap();
        image.set_index(1, -2);
        let mut out = Vec::new();
        image.write_point(1, &mut out).unwrap();
        assert_eq!(out, [0xff, 0xff, 0xff, 0xfe]);
        let back = IntermediateImage::<ScanIndex>::read_point(&mut out.as_slice()).unwrap();
        assert_eq!(back, -2);
    }
}
