//! Delayed task scheduling for slow retries.
//!
//! One scheduler thread sleeps until the earliest deadline, then hands the
//! due task to a `TaskPool`. The engine uses this for retries past the
//! fast-retry window, so there is one timer thread total instead of one
//! per invocation.

use super::pool::{Task, TaskPool};
use parking_lot::{Condvar, Mutex};
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Scheduled {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

struct Queue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    shutdown: bool,
}

struct DelayedInner {
    queue: Mutex<Queue>,
    wakeup: Condvar,
    seq: AtomicU64,
}

/// Single-threaded deadline scheduler feeding a worker pool.
pub struct DelayedExecutor {
    inner: Arc<DelayedInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DelayedExecutor {
    /// Spawn the scheduler thread; due tasks execute on `target`.
    #[must_use]
    pub fn new(name: &str, target: Arc<TaskPool>) -> Self {
        let inner = Arc::new(DelayedInner {
            queue: Mutex::new(Queue {
                heap: BinaryHeap::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            seq: AtomicU64::new(0),
        });

        let loop_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name(format!("ferrite-{}", name))
            .spawn(move || scheduler_loop(&loop_inner, &target))
            .expect("scheduler thread spawn should not fail");

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Schedule a task to run after `delay`.
    pub fn schedule(&self, delay: Duration, task: Task) {
        let scheduled = Scheduled {
            due: Instant::now() + delay,
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
            task,
        };
        let mut queue = self.inner.queue.lock();
        if queue.shutdown {
            return;
        }
        queue.heap.push(Reverse(scheduled));
        self.inner.wakeup.notify_one();
    }

    /// Number of tasks waiting for their deadline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().heap.len()
    }

    /// Stop the scheduler thread, dropping tasks whose deadline has not
    /// arrived. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut queue = self.inner.queue.lock();
            queue.shutdown = true;
            self.inner.wakeup.notify_all();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DelayedExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn scheduler_loop(inner: &DelayedInner, target: &TaskPool) {
    let mut queue = inner.queue.lock();
    loop {
        if queue.shutdown {
            break;
        }
        match queue.heap.peek().map(|entry| entry.0.due) {
            None => inner.wakeup.wait(&mut queue),
            Some(due) => {
                if due <= Instant::now() {
                    if let Some(Reverse(scheduled)) = queue.heap.pop() {
                        drop(queue);
                        target.execute(scheduled.task);
                        queue = inner.queue.lock();
                    }
                } else {
                    let _ = inner.wakeup.wait_until(&mut queue, due);
                }
            }
        }
    }
}
