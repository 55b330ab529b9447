//! Render engine for Refract.
//!
//! A render is split between a fixed set of worker threads, each of which owns
//! a statically-assigned share of the pixels:
//! -   The [`Schedule`] decides the share and the order: a plain interleaved
//!     [`RasterScan`], or a coarse-to-fine [`ProgressiveRefinement`].
//! -   Each worker publishes a monotonic checkpoint ([`Progress`]) after the
//!     pixels it has written; the minimum over all workers bounds what is safe
//!     to read.
//! -   A [`Consumer`] on another thread paints the safe part into a bitmap,
//!     without taking locks.
//!
//! Runs can be interrupted between points, resumed, and saved to a stream
//! with [`persist`].

mod barrier;
pub mod consumer;
mod intermediate;
pub mod persist;
mod production;
mod progress;
mod refinement;
mod scan;
mod schedule;
mod workers;

use thiserror::Error;

pub use barrier::{BarrierError, CyclicBarrier};
pub use consumer::{Consumer, ProgressiveRefinementConsumer, RasterScanConsumer, Region};
pub use intermediate::IntermediateImage;
pub use persist::{FormatError, Persist};
pub use production::{ProduceError, Producer, Production, LOG_CAPACITY};
pub use progress::{Progress, ProgressValue, RefinementValue, ScanIndex};
pub use refinement::{ProgressiveRefinement, RefinementGrid, MAX_STEPS};
pub use scan::RasterScan;
pub use schedule::{PointFailure, PointTask, RunState, Schedule};
pub use workers::{Finished, Workers};

/// Errors that can occur while setting up or running a render.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Produce(#[from] ProduceError),
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}
