use std::thread::{self, JoinHandle};

use crate::{
    production::{ProduceError, Producer},
    schedule::{RunState, Schedule},
    Error,
};

/// One OS thread per producer.
pub struct Workers<V, S> {
    handles: Vec<(usize, JoinHandle<Finished<V, S>>)>,
}

/// A producer handed back by its thread, with how it stopped.
pub struct Finished<V, S> {
    pub producer: Producer<V, S>,
    pub outcome: Result<RunState, ProduceError>,
}

impl<V: 'static, S: Schedule> Workers<V, S> {
    pub fn spawn(producers: Vec<Producer<V, S>>) -> Result<Self, Error> {
        let mut handles = Vec::with_capacity(producers.len());
        for producer in producers {
            let worker = producer.worker();
            let handle = thread::Builder::new()
                .name(format!("refract-worker-{worker}"))
                .spawn(move || drive(producer))?;
            handles.push((worker, handle));
        }
        tracing::debug!(threads = handles.len(), "spawned workers");
        Ok(Workers { handles })
    }

    /// Whether every thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Waits for every thread and hands the producers back, in worker order.
    pub fn join(self) -> Result<Vec<Finished<V, S>>, Error> {
        let mut finished = Vec::with_capacity(self.handles.len());
        for (worker, handle) in self.handles {
            finished.push(handle.join().map_err(|_| Error::WorkerPanicked(worker))?);
        }
        Ok(finished)
    }
}

/// Runs until the producer completes, is interrupted, or fails for good.
fn drive<V: 'static, S: Schedule>(mut producer: Producer<V, S>) -> Finished<V, S> {
    loop {
        match producer.run() {
            Ok(state) => {
                return Finished {
                    producer,
                    outcome: Ok(state),
                }
            }
            Err(error) => {
                if let Err(error) = producer.handle_error(error) {
                    return Finished {
                        producer,
                        outcome: Err(error),
                    };
                }
            }
        }
    }
}
