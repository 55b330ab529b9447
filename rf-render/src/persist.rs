//! Saving and restoring a partially computed image.
//!
//! The stream is big-endian `i32`s: `width, height, workers`, then the
//! schedule's checkpoints, then the value of every pixel computed as of those
//! checkpoints, in the schedule's canonical order.
//!
//! Loading validates the whole stream before it touches the image.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::{
    intermediate::IntermediateImage,
    progress::{RefinementValue, ScanIndex},
    refinement::ProgressiveRefinement,
    scan::RasterScan,
    schedule::Schedule,
};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("checkpoint stream ended early")]
    Truncated,
    #[error("checkpoint is for {found}, not {expected}")]
    HeaderMismatch { expected: String, found: String },
    #[error("checkpoint of worker {worker} is invalid: {reason}")]
    InvalidCheckpoint { worker: usize, reason: String },
    #[error("checkpoints are inconsistent: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for FormatError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::Truncated
        } else {
            FormatError::Io(error)
        }
    }
}

/// A schedule whose checkpoints can be written out and read back.
pub trait Persist: Schedule {
    fn write_checkpoints(&self, checkpoints: &[Self::Value], out: &mut dyn Write)
        -> io::Result<()>;

    /// Reads and validates one checkpoint per worker.
    fn read_checkpoints(&self, input: &mut dyn Read) -> Result<Vec<Self::Value>, FormatError>;

    /// Indices of the pixels computed as of `checkpoints`, in canonical order.
    fn computed(&self, checkpoints: &[Self::Value]) -> Vec<usize>;
}

/// Writes the image's current state.
///
/// Producers may keep running; the stream describes the state as of the
/// moment the checkpoints were read.
pub fn save<S: Persist, W: Write>(schedule: &S, mut out: W) -> Result<(), FormatError> {
    let image = schedule.image();
    let checkpoints: Vec<_> = image.all_progress().iter().map(|p| p.get()).collect();
    write_i32(&mut out, image.width())?;
    write_i32(&mut out, image.height())?;
    write_i32(&mut out, image.workers())?;
    schedule.write_checkpoints(&checkpoints, &mut out)?;
    let computed = schedule.computed(&checkpoints);
    for index in computed.iter() {
        image.write_point(*index, &mut out)?;
    }
    out.flush()?;
    tracing::debug!(points = computed.len(), "saved checkpoint");
    Ok(())
}

/// Restores a state written by [`save`].
///
/// No producer may be running. On error the image is left unchanged.
pub fn load<S: Persist, R: Read>(schedule: &S, mut input: R) -> Result<(), FormatError> {
    let image = schedule.image();
    let header = [
        read_i32(&mut input)?,
        read_i32(&mut input)?,
        read_i32(&mut input)?,
    ];
    let expected = [
        image.width() as i64,
        image.height() as i64,
        image.workers() as i64,
    ];
    if header.map(i64::from) != expected {
        return Err(FormatError::HeaderMismatch {
            expected: describe(expected),
            found: describe(header.map(i64::from)),
        });
    }
    let checkpoints = schedule.read_checkpoints(&mut input)?;
    let computed = schedule.computed(&checkpoints);
    let mut values = Vec::with_capacity(computed.len());
    for _ in 0..computed.len() {
        values.push(IntermediateImage::<S::Value>::read_point(&mut input)?);
    }

    for (index, value) in computed.iter().zip(values) {
        image.set_index(*index, value);
    }
    for (progress, checkpoint) in image.all_progress().iter().zip(checkpoints) {
        progress.set(checkpoint);
    }
    tracing::debug!(points = computed.len(), "loaded checkpoint");
    Ok(())
}

fn describe([width, height, workers]: [i64; 3]) -> String {
    format!("a {width}x{height} image with {workers} workers")
}

fn write_i32(out: &mut dyn Write, value: impl TryInto<i32>) -> io::Result<()> {
    let value = value
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "value does not fit in i32"))?;
    out.write_all(&i32::to_be_bytes(value))
}

fn read_i32(input: &mut dyn Read) -> Result<i32, FormatError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u32(input: &mut dyn Read, worker: usize, field: &str) -> Result<u32, FormatError> {
    let value = read_i32(input)?;
    u32::try_from(value).map_err(|_| FormatError::InvalidCheckpoint {
        worker,
        reason: format!("negative {field} {value}"),
    })
}

impl Persist for RasterScan {
    fn write_checkpoints(&self, checkpoints: &[ScanIndex], out: &mut dyn Write) -> io::Result<()> {
        for ScanIndex(index) in checkpoints {
            write_i32(out, *index)?;
        }
        Ok(())
    }

    fn read_checkpoints(&self, input: &mut dyn Read) -> Result<Vec<ScanIndex>, FormatError> {
        let stride = self.stride();
        let mut checkpoints = Vec::with_capacity(self.workers());
        for (worker, progress) in self.image().all_progress().iter().enumerate() {
            let index = read_u32(input, worker, "index")? as u64;
            let invalid = |reason: String| FormatError::InvalidCheckpoint { worker, reason };
            let (initial, last) = (progress.initial().0, progress.final_value().0);
            if index < initial || index > last {
                return Err(invalid(format!("{index} is outside {initial}..={last}")));
            }
            if (index - initial) % stride != 0 {
                return Err(invalid(format!("{index} is not one of this worker's points")));
            }
            checkpoints.push(ScanIndex(index));
        }
        Ok(checkpoints)
    }

    fn computed(&self, checkpoints: &[ScanIndex]) -> Vec<usize> {
        let workers = checkpoints.len() as u64;
        (0..self.image().len() as u64)
            .filter(|index| *index < checkpoints[(index % workers) as usize].0)
            .map(|index| index as usize)
            .collect()
    }
}

impl Persist for ProgressiveRefinement {
    fn write_checkpoints(
        &self,
        checkpoints: &[RefinementValue],
        out: &mut dyn Write,
    ) -> io::Result<()> {
        // Single-pass refinements carry no step count.
        if self.grid().steps() > 1 {
            write_i32(out, self.grid().steps())?;
        }
        for value in checkpoints {
            write_i32(out, value.turn)?;
            write_i32(out, value.x)?;
            write_i32(out, value.y)?;
            write_i32(out, value.chunk)?;
        }
        Ok(())
    }

    fn read_checkpoints(&self, input: &mut dyn Read) -> Result<Vec<RefinementValue>, FormatError> {
        let grid = self.grid();
        if grid.steps() > 1 {
            let steps = read_i32(input)?;
            if i64::from(steps) != grid.steps() as i64 {
                return Err(FormatError::HeaderMismatch {
                    expected: format!("{} refinement steps", grid.steps()),
                    found: format!("{steps} refinement steps"),
                });
            }
        }
        let mut checkpoints = Vec::with_capacity(self.workers());
        let mut positions = Vec::with_capacity(self.workers());
        for worker in 0..self.workers() {
            let turn = read_u32(input, worker, "turn")?;
            let x = read_u32(input, worker, "x")?;
            let y = read_u32(input, worker, "y")?;
            let chunk = read_u32(input, worker, "chunk")?;
            let invalid = |reason: String| FormatError::InvalidCheckpoint { worker, reason };
            let turn = u16::try_from(turn).map_err(|_| invalid(format!("turn {turn}")))?;
            let value = RefinementValue::new(turn, x, y, chunk);
            let (pass, k) = grid
                .locate(value)
                .ok_or_else(|| invalid(format!("{value:?} is not on the grid")))?;
            if k < grid.cells(pass) && grid.owner(k) as usize != worker {
                return Err(invalid(format!(
                    "cell {k} of pass {pass} belongs to worker {}",
                    grid.owner(k)
                )));
            }
            checkpoints.push(grid.value_at(pass, k));
            positions.push((pass, k));
        }
        // A worker may still sit at the end of the previous pass while its
        // peers have already started the next one.
        let latest = positions.iter().map(|(pass, _)| *pass).max().unwrap_or(0);
        let behind = positions.iter().position(|(pass, k)| {
            *pass != latest && !(*pass + 1 == latest && *k == grid.cells(*pass))
        });
        if let Some(worker) = behind {
            return Err(FormatError::Inconsistent(format!(
                "worker {worker} is on pass {} but another worker is on pass {latest}",
                positions[worker].0
            )));
        }
        Ok(checkpoints)
    }

    fn computed(&self, checkpoints: &[RefinementValue]) -> Vec<usize> {
        let grid = self.grid();
        let image = self.image();
        let reached: Vec<_> = checkpoints.iter().map(|v| grid.position(*v)).collect();
        let mut computed = Vec::new();
        for pass in 0..grid.steps() {
            let parent = grid.chunk(pass) * 2;
            for k in 0..grid.cells(pass) {
                if (pass, k) >= reached[grid.owner(k) as usize] {
                    continue;
                }
                let RefinementValue { x, y, .. } = grid.value_at(pass, k);
                // Already written with the coarser pass.
                if pass > 0 && x % parent == 0 && y % parent == 0 {
                    continue;
                }
                computed.push(image.index(x, y));
            }
        }
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressValue;

    fn fill<P: ProgressValue>(image: &IntermediateImage<P>) {
        for index in 0..image.len() {
            image.set_index(index, index as i32 * 3 - 7);
        }
    }

    #[test]
    fn raster_round_trip() {
        let source = RasterScan::new(5, 3, 2).unwrap();
        fill(source.image());
        source.image().progress(0).set(ScanIndex(8));
        source.image().progress(1).set(ScanIndex(3));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        // Header, two checkpoints, then pixels 0, 1, 2, 4 and 6.
        assert_eq!(bytes.len(), 4 * (3 + 2 + 5));

        let restored = RasterScan::new(5, 3, 2).unwrap();
        load(&restored, bytes.as_slice()).unwrap();
        assert_eq!(restored.image().progress(0).get(), ScanIndex(8));
        assert_eq!(restored.image().progress(1).get(), ScanIndex(3));
        for index in [0, 1, 2, 4, 6] {
            assert_eq!(restored.image().get_index(index), index as i32 * 3 - 7);
        }
        assert_eq!(restored.image().get_index(3), 0);
        assert_eq!(restored.image().get_index(8), 0);
    }

    #[test]
    fn truncated_streams_change_nothing() {
        let source = RasterScan::new(4, 4, 1).unwrap();
        fill(source.image());
        source.image().progress(0).set(ScanIndex(10));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);

        let restored = RasterScan::new(4, 4, 1).unwrap();
        assert!(matches!(
            load(&restored, bytes.as_slice()),
            Err(FormatError::Truncated)
        ));
        assert_eq!(restored.image().progress(0).get(), ScanIndex(0));
        assert!((0..16).all(|i| restored.image().get_index(i) == 0));
    }

    #[test]
    fn header_must_match() {
        let mut bytes = Vec::new();
        save(&RasterScan::new(4, 4, 2).unwrap(), &mut bytes).unwrap();
        let error = load(&RasterScan::new(4, 4, 3).unwrap(), bytes.as_slice()).unwrap_err();
        assert!(matches!(error, FormatError::HeaderMismatch { .. }));
        assert!(error.to_string().contains("4x4 image with 2 workers"));
    }

    #[test]
    fn raster_checkpoints_are_validated() {
        let header = |index: i32| -> Vec<u8> {
            [4, 1, 2, index, 1]
                .iter()
                .flat_map(|v: &i32| v.to_be_bytes())
                .collect()
        };
        let schedule = RasterScan::new(4, 1, 2).unwrap();
        // Worker 0 owns even indices up to 4.
        for bad in [1, 6, -2] {
            assert!(matches!(
                load(&schedule, header(bad).as_slice()),
                Err(FormatError::InvalidCheckpoint { worker: 0, .. })
            ));
        }
        let mut good = header(2);
        good.extend(9i32.to_be_bytes());
        load(&schedule, good.as_slice()).unwrap();
        assert_eq!(schedule.image().get_index(0), 9);
    }

    #[test]
    fn refinement_round_trip() {
        let source = ProgressiveRefinement::new(6, 5, 3, 2).unwrap();
        let grid = *source.grid();
        fill(source.image());
        source.image().progress(0).set(grid.value_at(1, 6));
        source.image().progress(1).set(grid.value_at(1, 3));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();

        let restored = ProgressiveRefinement::new(6, 5, 3, 2).unwrap();
        load(&restored, bytes.as_slice()).unwrap();
        for worker in 0..2 {
            assert_eq!(
                restored.image().progress(worker).get(),
                source.image().progress(worker).get()
            );
        }
        // Pass 0 computed every multiple of 4. Of pass 1, cells 0, 1, 2 and 4
        // are done, and only 1 and 4 are new.
        let mut expected: Vec<_> = [(0, 0), (4, 0), (0, 4), (4, 4), (2, 0), (2, 2)]
            .iter()
            .map(|(x, y)| source.image().index(*x, *y))
            .collect();
        expected.sort();
        let mut computed = restored.computed(&[grid.value_at(1, 6), grid.value_at(1, 3)]);
        computed.sort();
        assert_eq!(computed, expected);
        for index in 0..30 {
            let value = restored.image().get_index(index);
            if expected.contains(&index) {
                assert_eq!(value, index as i32 * 3 - 7);
            } else {
                assert_eq!(value, 0);
            }
        }
    }

    #[test]
    fn single_pass_refinement_has_no_step_count() {
        let source = ProgressiveRefinement::new(2, 2, 1, 1).unwrap();
        fill(source.image());
        let done = source.grid().final_value();
        source.image().progress(0).set(done);
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        let words: Vec<i32> = bytes
            .chunks_exact(4)
            .map(|word| i32::from_be_bytes(word.try_into().unwrap()))
            .collect();
        // Header, one checkpoint (turn, x, y, chunk), then all four pixels.
        assert_eq!(words, [2, 2, 1, 0, 0, 2, 1, -7, -4, -1, 2]);

        let restored = ProgressiveRefinement::new(2, 2, 1, 1).unwrap();
        load(&restored, bytes.as_slice()).unwrap();
        assert!(restored.image().is_complete());
        assert_eq!(restored.image().get(1, 1), 2);
    }

    #[test]
    fn refinement_checkpoints_must_agree() {
        let source = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        let grid = *source.grid();
        source.image().progress(0).set(grid.value_at(1, 2));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        let restored = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        assert!(matches!(
            load(&restored, bytes.as_slice()),
            Err(FormatError::Inconsistent(_))
        ));

        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        let finer = ProgressiveRefinement::new(4, 4, 3, 2).unwrap();
        assert!(matches!(
            load(&finer, bytes.as_slice()),
            Err(FormatError::HeaderMismatch { .. })
        ));

        // One worker has not yet left the end of pass 0; the other has.
        let source = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        source.image().progress(0).set(grid.end_of_pass(0));
        source.image().progress(1).set(grid.value_at(1, 3));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        let restored = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        load(&restored, bytes.as_slice()).unwrap();
        assert_eq!(restored.image().progress(1).get(), grid.value_at(1, 3));
    }

    #[test]
    fn refinement_ownership_is_checked() {
        let source = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        let grid = *source.grid();
        // Worker 1 claims worker 0's cell.
        source.image().progress(1).set(grid.value_at(0, 2));
        let mut bytes = Vec::new();
        save(&source, &mut bytes).unwrap();
        let restored = ProgressiveRefinement::new(4, 4, 2, 2).unwrap();
        assert!(matches!(
            load(&restored, bytes.as_slice()),
            Err(FormatError::InvalidCheckpoint { worker: 1, .. })
        ));
    }
}
