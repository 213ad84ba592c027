//! Background monitor driving timeouts across live invocations.
//!
//! One thread sweeps the registry at a fixed cadence and gives every live
//! invocation the chance to expire its call window or deal with overdue
//! backups. There are no per-invocation timers.

use crate::config::EngineConfig;
use crate::registry::InvocationRegistry;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

struct MonitorInner {
    registry: Arc<InvocationRegistry>,
    backup_timeout_millis: u64,
    scan_interval: Duration,
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// Periodic sweep over the invocation registry.
pub struct InvocationMonitor {
    inner: Arc<MonitorInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InvocationMonitor {
    /// Start the monitor thread.
    #[must_use]
    pub fn start(registry: Arc<InvocationRegistry>, config: &EngineConfig) -> Self {
        let inner = Arc::new(MonitorInner {
            registry,
            backup_timeout_millis: config.backup_timeout_millis,
            scan_interval: Duration::from_millis(config.scan_interval_millis),
            stopped: Mutex::new(false),
            wakeup: Condvar::new(),
        });

        let loop_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name("ferrite-invocation-monitor".to_string())
            .spawn(move || monitor_loop(&loop_inner))
            .expect("monitor thread spawn should not fail");

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop the monitor thread. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stopped = self.inner.stopped.lock();
            *stopped = true;
            self.inner.wakeup.notify_all();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InvocationMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn monitor_loop(inner: &MonitorInner) {
    debug!(scan_interval = ?inner.scan_interval, "invocation monitor started");
    loop {
        {
            let mut stopped = inner.stopped.lock();
            if *stopped {
                break;
            }
            let _ = inner.wakeup.wait_for(&mut stopped, inner.scan_interval);
            if *stopped {
                break;
            }
        }

        inner.registry.scan(|invocation| {
            invocation.notify_invocation_timeout();
            invocation.check_backup_timeout(inner.backup_timeout_millis);
        });
    }
    debug!("invocation monitor stopped");
}
