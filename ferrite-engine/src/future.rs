//! The invocation future.
//!
//! A single-assignment result cell shared by the invoker (who waits on it)
//! and the invocation (who completes it). Completion is idempotent: every
//! completion path races on the same cell and the first writer wins.
//!
//! Between attempts the cell is marked *waiting*, a non-terminal sentinel
//! telling blocked threads the invocation is still being retried. Waiters
//! honor their own deadline regardless.

use ferrite_core::{FerriteError, InvocationResult};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Callback fired exactly once when the future completes.
pub type CompletionCallback = Box<dyn FnOnce(&InvocationResult) + Send + 'static>;

#[derive(Debug)]
enum FutureState {
    /// No attempt has produced a signal yet.
    Pending,
    /// A retry is in flight; the invocation is still running.
    Waiting,
    /// Terminal result.
    Complete(InvocationResult),
}

/// Single-assignment result cell with blocking and callback completion.
pub struct InvocationFuture {
    state: Mutex<FutureState>,
    done: Condvar,
    waiters: AtomicUsize,
    interrupted: AtomicBool,
    max_call_timeout_millis: u64,
    callback: Mutex<Option<CompletionCallback>>,
}

impl InvocationFuture {
    /// Create a pending future.
    ///
    /// `max_call_timeout_millis` is the invocation's derived call timeout;
    /// `u64::MAX` means the monitor never expires this invocation.
    #[must_use]
    pub fn new(max_call_timeout_millis: u64) -> Self {
        Self {
            state: Mutex::new(FutureState::Pending),
            done: Condvar::new(),
            waiters: AtomicUsize::new(0),
            interrupted: AtomicBool::new(false),
            max_call_timeout_millis,
            callback: Mutex::new(None),
        }
    }

    /// Complete the future. Returns `true` for the first completion; later
    /// calls are no-ops and return `false`.
    pub fn complete(&self, result: InvocationResult) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if matches!(*state, FutureState::Complete(_)) {
                return false;
            }
            *state = FutureState::Complete(result.clone());
            self.done.notify_all();
            self.callback.lock().take()
        };
        if let Some(callback) = callback {
            callback(&result);
        }
        true
    }

    /// Mark the future as still running; wakes waiters so they can re-check
    /// their own deadline. No-op once complete.
    pub fn mark_waiting(&self) {
        let mut state = self.state.lock();
        if matches!(*state, FutureState::Pending | FutureState::Waiting) {
            *state = FutureState::Waiting;
            self.done.notify_all();
        }
    }

    /// Whether a terminal result is available.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(*self.state.lock(), FutureState::Complete(_))
    }

    /// The terminal result, if available.
    #[must_use]
    pub fn peek(&self) -> Option<InvocationResult> {
        match &*self.state.lock() {
            FutureState::Complete(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Block until completion or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns `FerriteError::FutureTimeout` when the deadline passes with
    /// no terminal result, or the invocation's own terminal error.
    pub fn get(&self, timeout: Duration) -> InvocationResult {
        let deadline = Instant::now().checked_add(timeout);
        self.wait_until(deadline, timeout)
    }

    /// Block until completion, with no deadline of this waiter's own.
    pub fn join(&self) -> InvocationResult {
        self.wait_until(None, Duration::ZERO)
    }

    fn wait_until(&self, deadline: Option<Instant>, timeout: Duration) -> InvocationResult {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        let result = {
            let mut state = self.state.lock();
            loop {
                if let FutureState::Complete(result) = &*state {
                    break result.clone();
                }
                match deadline {
                    Some(deadline) => {
                        if self.done.wait_until(&mut state, deadline).timed_out() {
                            if let FutureState::Complete(result) = &*state {
                                break result.clone();
                            }
                            break Err(FerriteError::FutureTimeout {
                                waited_millis: timeout.as_millis() as u64,
                            });
                        }
                    }
                    None => self.done.wait(&mut state),
                }
            }
        };
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Flag the invocation as interrupted.
    ///
    /// The flag is observed on the next retry transition, which completes
    /// the future with `FerriteError::Interrupted`. Blocked waiters are not
    /// woken early; they return when the invocation completes.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    /// Whether `interrupt` has been called.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Number of threads currently blocked on this future.
    #[must_use]
    pub fn waiting_threads(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// The invocation's derived call timeout; `u64::MAX` means infinite.
    #[must_use]
    pub fn max_call_timeout_millis(&self) -> u64 {
        self.max_call_timeout_millis
    }

    /// Register a completion callback.
    ///
    /// Runs immediately on the calling thread when the future is already
    /// complete, otherwise exactly once at completion time. Only one
    /// callback slot exists; a second registration replaces an unfired one.
    pub fn on_complete(&self, callback: CompletionCallback) {
        let ready = {
            let state = self.state.lock();
            match &*state {
                FutureState::Complete(result) => Some(result.clone()),
                _ => {
                    *self.callback.lock() = Some(callback);
                    return;
                }
            }
        };
        if let Some(result) = ready {
            callback(&result);
        }
    }
}

impl std::fmt::Debug for InvocationFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationFuture")
            .field("state", &*self.state.lock())
            .field("waiters", &self.waiting_threads())
            .field("interrupted", &self.interrupted())
            .field("max_call_timeout_millis", &self.max_call_timeout_millis)
            .finish()
    }
}
