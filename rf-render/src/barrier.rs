//! Reusable rendezvous for a fixed number of workers, which can be broken.
//!
//! `std::sync::Barrier` cannot release its waiters early, which an interrupted
//! render needs.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex,
};

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("barrier was broken")]
    Broken,
    #[error("barrier lock poisoned")]
    Poisoned,
}

/// A cyclic barrier for `parties` workers.
#[derive(Debug)]
pub struct CyclicBarrier {
    parties: usize,
    state: Mutex<State>,
    cv: Condvar,
}

#[derive(Debug)]
struct State {
    waiting: usize,
    // Replaced each time the barrier trips; set when it is broken.
    generation: Arc<AtomicBool>,
}

impl CyclicBarrier {
    pub fn new(parties: usize) -> Self {
        CyclicBarrier {
            parties: parties.max(1),
            state: Mutex::new(State {
                waiting: 0,
                generation: Arc::new(AtomicBool::new(false)),
            }),
            cv: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Blocks until all parties have arrived.
    ///
    /// Returns `Ok(true)` for the party that tripped the barrier. Returns
    /// `Err(Broken)` if the barrier is broken before or while waiting.
    pub fn wait(&self) -> Result<bool, BarrierError> {
        let mut g = self.state.lock().map_err(|_| BarrierError::Poisoned)?;
        let generation = g.generation.clone();
        if generation.load(Ordering::Acquire) {
            return Err(BarrierError::Broken);
        }
        g.waiting += 1;
        if g.waiting == self.parties {
            g.waiting = 0;
            g.generation = Arc::new(AtomicBool::new(false));
            self.cv.notify_all();
            return Ok(true);
        }
        loop {
            g = self.cv.wait(g).map_err(|_| BarrierError::Poisoned)?;
            if generation.load(Ordering::Acquire) {
                return Err(BarrierError::Broken);
            }
            if !Arc::ptr_eq(&generation, &g.generation) {
                return Ok(false);
            }
        }
    }

    /// Releases every waiter with [`BarrierError::Broken`]. Later waits fail
    /// too, until [`CyclicBarrier::reset`].
    pub fn break_barrier(&self) {
        if let Ok(mut g) = self.state.lock() {
            g.generation.store(true, Ordering::Release);
            g.waiting = 0;
        }
        self.cv.notify_all();
    }

    /// Starts a fresh generation. Anyone still waiting is broken out.
    pub fn reset(&self) {
        if let Ok(mut g) = self.state.lock() {
            g.generation.store(true, Ordering::Release);
            g.generation = Arc::new(AtomicBool::new(false));
            g.waiting = 0;
        }
        self.cv.notify_all();
    }

    pub fn is_broken(&self) -> bool {
        match self.state.lock() {
            Ok(g) => g.generation.load(Ordering::Acquire),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn trips_once_per_generation() {
        let barrier = Arc::new(CyclicBarrier::new(3));
        for _round in 0..3 {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let barrier = barrier.clone();
                    thread::spawn(move || barrier.wait())
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(results.iter().filter(|r| **r == Ok(true)).count(), 1);
            assert_eq!(results.iter().filter(|r| **r == Ok(false)).count(), 2);
        }
    }

    #[test]
    fn breaking_releases_waiters() {
        let barrier = Arc::new(CyclicBarrier::new(3));
        let waiter = {
            let barrier = barrier.clone();
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.break_barrier();
        assert_eq!(waiter.join().unwrap(), Err(BarrierError::Broken));
        assert!(barrier.is_broken());
        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }

    #[test]
    fn reset_is_idempotent() {
        let barrier = CyclicBarrier::new(1);
        barrier.reset();
        barrier.reset();
        assert!(!barrier.is_broken());
        assert_eq!(barrier.wait(), Ok(true));

        barrier.break_barrier();
        barrier.reset();
        assert_eq!(barrier.wait(), Ok(true));
    }
}
