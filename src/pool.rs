//! Fixed-size worker pool.
//!
//! A FIFO task queue drained by a fixed set of OS threads. The pool's
//! only contract is "submit a task, wait on a countdown": callers pair
//! [`WorkerPool::execute`] with a [`crossbeam::sync::WaitGroup`] to
//! await a batch. Dropping the pool closes the queue and joins every
//! worker after the queued tasks have run to completion.

use crossbeam::channel::{self, Sender};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads draining a FIFO queue.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` threads named `<name>-0` .. `<name>-N`.
    ///
    /// Panics when `workers` is zero; worker counts are validated up
    /// front by [`HeapConfig`](crate::HeapConfig).
    pub fn new(workers: usize, name: &str) -> Self {
        assert!(workers > 0, "worker pool requires at least one thread");

        let (sender, receiver) = channel::unbounded::<Task>();
        let workers = (0..workers)
            .map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("{name}-{index}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            task();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Enqueue a task for execution on some worker.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .as_ref()
            .expect("pool is draining")
            .send(Box::new(task))
            .expect("worker threads exited early");
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker finish the queued tasks
        // and observe the disconnect.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
