//! Fixed-size worker pool for engine tasks.
//!
//! Each worker owns its own queue; submissions round-robin across workers.
//! Used for fast retries and anything else the engine must get off the
//! notifying thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// A unit of work submitted to a pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Terminate,
}

/// Fixed set of worker threads, one queue per worker.
pub struct TaskPool {
    name: String,
    senders: Vec<mpsc::Sender<Message>>,
    next: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// Spawn a pool of `size` workers (at least one).
    #[must_use]
    pub fn new(name: &str, size: usize) -> Self {
        let size = size.max(1);
        let mut senders = Vec::with_capacity(size);
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let (sender, receiver) = mpsc::channel::<Message>();
            senders.push(sender);
            let handle = thread::Builder::new()
                .name(format!("ferrite-{}-{}", name, index))
                .spawn(move || worker_loop(receiver))
                .expect("worker thread spawn should not fail");
            workers.push(handle);
        }

        Self {
            name: name.to_string(),
            senders,
            next: AtomicUsize::new(0),
            workers: Mutex::new(workers),
        }
    }

    /// Submit a task for execution on one of the workers.
    pub fn execute(&self, task: Task) {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        if self.senders[index].send(Message::Run(task)).is_err() {
            warn!(pool = %self.name, "task submitted after pool shutdown was dropped");
        }
    }

    /// Stop every worker and wait for them to finish queued work.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn shutdown(&self) {
        for sender in &self.senders {
            let _ = sender.send(Message::Terminate);
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: mpsc::Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(task) => task(),
            Message::Terminate => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn tasks_run_on_workers() {
        let pool = TaskPool::new("test", 2);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = TaskPool::new("test", 1);
        pool.shutdown();
        pool.shutdown();
    }

    #[test]
    fn queued_work_drains_before_shutdown() {
        let pool = TaskPool::new("test", 1);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                std::thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
