//! # Pool Module
//!
//! A fixed-size pool of worker threads fed from a bounded queue.
//!
//! Tasks are fire-and-forget closures with no return value. A task that
//! needs to report a result closes over its own sink (an accumulator or a
//! mutex-guarded error list); the pool never inspects outcomes.
//!
//! ## Backpressure
//! `submit` blocks the caller while the queue is full. This is how a
//! producer listing thousands of files is kept in step with the workers.
//!
//! ## Example
//! ```rust,ignore
//! let pool = WorkerPool::new(4, 64)?;
//! for path in paths {
//!     pool.submit(move || remove(path));
//! }
//! pool.wait();
//! ```

use crate::error::PoolError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Fewest worker threads a pool may be built with
pub const MIN_THREADS: usize = 2;

/// Smallest queue capacity a pool may be built with
pub const MIN_QUEUE_CAPACITY: usize = 10;

/// A unit of work executed by the pool
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Bounded-concurrency task executor
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `thread_count` workers sharing a queue of `queue_capacity` tasks
    pub fn new(thread_count: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        if thread_count < MIN_THREADS {
            return Err(PoolError::ThreadCountTooSmall {
                requested: thread_count,
                minimum: MIN_THREADS,
            });
        }

        if queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(PoolError::QueueTooSmall {
                requested: queue_capacity,
                minimum: MIN_QUEUE_CAPACITY,
            });
        }

        let (sender, receiver) = bounded::<Task>(queue_capacity);

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(thread_count),
        };

        for id in 0..thread_count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("hashimg-worker-{id}"))
                .spawn(move || worker_loop(receiver))
                .map_err(PoolError::Spawn)?;
            pool.workers.push(handle);
        }

        debug!(thread_count, queue_capacity, "worker pool started");
        Ok(pool)
    }

    /// Number of worker threads
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task, blocking while the queue is full
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };

        // Workers only stop once the sender is gone, so this cannot fail
        // while the pool is alive.
        if sender.send(Box::new(task)).is_err() {
            warn!("worker pool queue closed; task dropped");
        }
    }

    /// Close the queue and block until every queued and running task is done.
    ///
    /// Consumes the pool, so nothing can be submitted afterwards.
    pub fn wait(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender ends each worker's receive loop once drained
        drop(self.sender.take());

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<Task>) {
    for task in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("worker task panicked");
        }
    }
}
