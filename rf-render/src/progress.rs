//! Per-worker checkpoints.
//!
//! A worker publishes everything it has written to the image by storing its
//! next checkpoint with release ordering; readers load checkpoints with
//! acquire ordering and only look at pixels the checkpoints cover.

use std::{
    cmp::Ordering,
    fmt::Debug,
    marker::PhantomData,
    sync::atomic::{self, AtomicU64},
};

/// A checkpoint value that fits in one atomic word.
pub trait ProgressValue: Copy + Ord + Debug + Send + Sync + 'static {
    fn to_bits(self) -> u64;

    fn from_bits(bits: u64) -> Self;
}

/// Raster scan checkpoint: the next pixel index to compute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanIndex(pub u64);

impl ProgressValue for ScanIndex {
    fn to_bits(self) -> u64 {
        self.0
    }

    fn from_bits(bits: u64) -> Self {
        ScanIndex(bits)
    }
}

/// Largest width or height a refinement checkpoint can address.
pub const MAX_REFINEMENT_DIMENSION: u32 = 1 << 20;

const TURN_BITS: u32 = 16;
const OFFSET_BITS: u32 = 21;
const CHUNK_BITS: u32 = 5;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Progressive refinement checkpoint.
///
/// `turn` records whose turn the position is; it takes no part in equality
/// or ordering. Coarser chunks sort first, then positions in row-major order.
#[derive(Copy, Clone, Debug)]
pub struct RefinementValue {
    pub turn: u16,
    pub x: u32,
    pub y: u32,
    /// A power of two.
    pub chunk: u32,
}

impl RefinementValue {
    pub fn new(turn: u16, x: u32, y: u32, chunk: u32) -> Self {
        RefinementValue { turn, x, y, chunk }
    }
}

impl PartialEq for RefinementValue {
    fn eq(&self, other: &Self) -> bool {
        (self.x, self.y, self.chunk) == (other.x, other.y, other.chunk)
    }
}

impl Eq for RefinementValue {}

impl Ord for RefinementValue {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .chunk
            .cmp(&self.chunk)
            .then(self.y.cmp(&other.y))
            .then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for RefinementValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ProgressValue for RefinementValue {
    /// Packs as `turn:16 | x:21 | y:21 | log2(chunk):5`.
    fn to_bits(self) -> u64 {
        let level = self.chunk.trailing_zeros() as u64;
        (self.turn as u64) << (2 * OFFSET_BITS + CHUNK_BITS)
            | (self.x as u64 & OFFSET_MASK) << (OFFSET_BITS + CHUNK_BITS)
            | (self.y as u64 & OFFSET_MASK) << CHUNK_BITS
            | level
    }

    fn from_bits(bits: u64) -> Self {
        RefinementValue {
            turn: (bits >> (2 * OFFSET_BITS + CHUNK_BITS)) as u16,
            x: ((bits >> (OFFSET_BITS + CHUNK_BITS)) & OFFSET_MASK) as u32,
            y: ((bits >> CHUNK_BITS) & OFFSET_MASK) as u32,
            chunk: 1 << (bits & ((1 << CHUNK_BITS) - 1)),
        }
    }
}

const _: () = assert!(TURN_BITS + 2 * OFFSET_BITS + CHUNK_BITS <= 64);

/// One worker's checkpoint: where it started, where it stops, and where it is.
#[derive(Debug)]
pub struct Progress<P> {
    initial: P,
    final_value: P,
    current: AtomicU64,
    _value: PhantomData<P>,
}

impl<P: ProgressValue> Progress<P> {
    pub fn new(initial: P, final_value: P) -> Self {
        Progress {
            initial,
            final_value,
            current: AtomicU64::new(initial.to_bits()),
            _value: PhantomData,
        }
    }

    pub fn initial(&self) -> P {
        self.initial
    }

    pub fn final_value(&self) -> P {
        self.final_value
    }

    pub fn get(&self) -> P {
        P::from_bits(self.current.load(atomic::Ordering::Acquire))
    }

    /// Publishes a new checkpoint, and with it every pixel written before.
    pub fn set(&self, value: P) {
        self.current.store(value.to_bits(), atomic::Ordering::Release);
    }

    pub fn is_complete(&self) -> bool {
        self.get() == self.final_value
    }
}
