//! One computation run, and the per-worker producers that carry it out.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use rf_core::{
    CoordinateTransform, Decimal, Formula, FormulaError, NumberFactory, PointCalculator,
};
use thiserror::Error;

use crate::{
    intermediate::IntermediateImage,
    progress::Progress,
    schedule::{PointFailure, PointTask, RunState, Schedule},
};

/// Default number of messages a producer remembers.
pub const LOG_CAPACITY: usize = 32;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ProduceError {
    /// One point failed; the producer can skip it and carry on.
    #[error(transparent)]
    Point(#[from] PointFailure),
    /// The producer could not prepare its formula.
    #[error("worker {worker} could not start: {source}")]
    Setup {
        worker: usize,
        #[source]
        source: FormulaError,
    },
}

/// Everything shared by the producers of one run.
pub struct Production<V, S> {
    schedule: Arc<S>,
    factory: Arc<dyn NumberFactory<V>>,
    formula: Box<dyn Formula<V>>,
    calculator: Box<dyn PointCalculator<V>>,
    transform: Arc<dyn CoordinateTransform<V>>,
    julia: Option<(Decimal, Decimal)>,
    interrupt: Arc<AtomicBool>,
    log_capacity: usize,
}

impl<V: 'static, S: Schedule> Production<V, S> {
    pub fn new(
        schedule: S,
        factory: Arc<dyn NumberFactory<V>>,
        formula: Box<dyn Formula<V>>,
        calculator: Box<dyn PointCalculator<V>>,
        transform: Arc<dyn CoordinateTransform<V>>,
    ) -> Self {
        Production {
            schedule: Arc::new(schedule),
            factory,
            formula,
            calculator,
            transform,
            julia: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            log_capacity: LOG_CAPACITY,
        }
    }

    /// Renders the Julia set for `re + im·i` instead of the parameter plane.
    pub fn with_julia(mut self, re: Decimal, im: Decimal) -> Self {
        self.julia = Some((re, im));
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn schedule(&self) -> &Arc<S> {
        &self.schedule
    }

    pub fn image(&self) -> &Arc<IntermediateImage<S::Value>> {
        self.schedule.image()
    }

    pub fn is_complete(&self) -> bool {
        self.image().is_complete()
    }

    /// One producer per worker, each with its own formula and calculator.
    ///
    /// No producer of this run may be running.
    pub fn producers(&self) -> Vec<Producer<V, S>> {
        self.schedule.prepare();
        (0..self.schedule.workers())
            .map(|worker| Producer {
                worker,
                schedule: self.schedule.clone(),
                factory: self.factory.clone(),
                formula: self.formula.new_instance(),
                calculator: self.calculator.new_instance(),
                transform: self.transform.clone(),
                julia: self.julia.clone(),
                interrupt: self.interrupt.clone(),
                started: false,
                log: VecDeque::with_capacity(self.log_capacity),
                log_capacity: self.log_capacity,
            })
            .collect()
    }

    /// Asks every producer to stop before its next point.
    pub fn interrupt(&self) {
        tracing::info!("interrupting production");
        self.interrupt.store(true, Ordering::Release);
        self.schedule.abandon();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Clears an interrupt so the producers can be run again.
    ///
    /// No producer of this run may be running.
    pub fn resume(&self) {
        tracing::info!("resuming production");
        self.interrupt.store(false, Ordering::Release);
        self.schedule.prepare();
    }
}

/// One worker's share of a [`Production`].
pub struct Producer<V, S> {
    worker: usize,
    schedule: Arc<S>,
    factory: Arc<dyn NumberFactory<V>>,
    formula: Box<dyn Formula<V>>,
    calculator: Box<dyn PointCalculator<V>>,
    transform: Arc<dyn CoordinateTransform<V>>,
    julia: Option<(Decimal, Decimal)>,
    interrupt: Arc<AtomicBool>,
    started: bool,
    log: VecDeque<String>,
    log_capacity: usize,
}

impl<V: 'static, S: Schedule> Producer<V, S> {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn progress(&self) -> &Progress<S::Value> {
        self.schedule.image().progress(self.worker)
    }

    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    /// Computes from the current checkpoint.
    ///
    /// The first call primes the formula; later calls pick up where the last
    /// one stopped.
    pub fn run(&mut self) -> Result<RunState, ProduceError> {
        let _span = tracing::info_span!("producer", worker = self.worker).entered();
        if !self.started {
            self.start()?;
            self.started = true;
        }
        let mut task = Task {
            formula: self.formula.as_mut(),
            calculator: self.calculator.as_mut(),
            transform: self.transform.as_ref(),
            interrupt: &self.interrupt,
        };
        let state = self.schedule.compute(self.worker, &mut task)?;
        tracing::debug!(?state, "producer stopped");
        Ok(state)
    }

    fn start(&mut self) -> Result<(), ProduceError> {
        let worker = self.worker;
        let setup = |source| ProduceError::Setup { worker, source };
        self.formula
            .cache_constants(self.factory.as_ref())
            .map_err(setup)?;
        let julia = match &self.julia {
            Some((re, im)) => Some(
                self.factory
                    .complex(re, im)
                    .map_err(|e| setup(e.into()))?,
            ),
            None => None,
        };
        self.formula.set_julia_point(julia);
        Ok(())
    }

    /// Deals with an error returned by [`Producer::run`].
    ///
    /// A failed point is logged and skipped, and the producer can be run
    /// again. Anything else gives up on this producer and releases its peers;
    /// the error is handed back.
    pub fn handle_error(&mut self, error: ProduceError) -> Result<(), ProduceError> {
        self.record(error.to_string());
        if let ProduceError::Point(failure) = &error {
            tracing::warn!(
                worker = self.worker,
                x = failure.x,
                y = failure.y,
                error = %failure.source,
                "skipping point"
            );
            self.schedule.skip(self.worker);
            return Ok(());
        }
        tracing::error!(worker = self.worker, %error, "producer failed");
        self.schedule.abandon();
        Err(error)
    }

    /// Recent error messages, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &str> + '_ {
        self.log.iter().map(String::as_str)
    }

    fn record(&mut self, message: String) {
        if self.log_capacity == 0 {
            return;
        }
        if self.log.len() == self.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(message);
    }
}

struct Task<'a, V> {
    formula: &'a mut dyn Formula<V>,
    calculator: &'a mut dyn PointCalculator<V>,
    transform: &'a dyn CoordinateTransform<V>,
    interrupt: &'a AtomicBool,
}

impl<V> PointTask for Task<'_, V> {
    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    fn evaluate(&mut self, x: u32, y: u32) -> Result<i32, FormulaError> {
        self.calculator
            .compute(x, y, self.transform, &mut *self.formula)
    }
}
