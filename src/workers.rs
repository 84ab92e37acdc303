#![warn(missing_docs)]

//! A bounded FIFO worker pool.
//!
//! Workers pop tasks off a bounded channel and run them to completion.
//! There is no work stealing and no priority - one queue, strict FIFO.
//! A panic inside a task is caught and logged; the worker survives it.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of OS threads consuming tasks from a shared bounded queue.
///
/// ## Example
///
/// ```
/// use aqueduct::workers::WorkerPool;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let mut pool = WorkerPool::new(2, 16);
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..8 {
///     let counter = counter.clone();
///     pool.submit(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// pool.shutdown();
/// assert_eq!(counter.load(Ordering::SeqCst), 8);
/// ```
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads sharing a queue bounded at `queue_cap`
    /// tasks. Both are clamped to at least one.
    pub fn new(workers: usize, queue_cap: usize) -> Self {
        let (sender, receiver) = bounded::<Job>(queue_cap.max(1));
        let workers = workers.max(1);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let receiver: Receiver<Job> = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("aqueduct-worker-{id}"))
                .spawn(move || {
                    // recv drains queued tasks even after the sender is
                    // gone, so shutdown never abandons accepted work.
                    while let Ok(job) = receiver.recv() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(worker = id, "task panicked; worker continues");
                        }
                    }
                    debug!(worker = id, "worker exiting");
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => error!(%err, worker = id, "failed to spawn worker thread"),
            }
        }

        WorkerPool {
            sender: Some(sender),
            handles,
        }
    }

    /// Enqueues a task.
    ///
    /// When the queue is at capacity this call **blocks** until a worker
    /// frees a slot - back-pressure lands on the accept loop rather than
    /// on an unbounded queue. Tasks submitted after shutdown are dropped
    /// with a warning.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        match &self.sender {
            Some(sender) => {
                if sender.send(Box::new(job)).is_err() {
                    warn!("task submitted after pool shutdown; dropped");
                }
            }
            None => warn!("task submitted after pool shutdown; dropped"),
        }
    }

    /// How many worker threads are alive.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Closes the queue, lets workers drain what is already enqueued,
    /// and joins them. Idempotent.
    pub fn shutdown(&mut self) {
        drop(self.sender.take());
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
