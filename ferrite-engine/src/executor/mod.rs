//! Local operation execution.
//!
//! `PartitionExecutor` owns the operation threads: partition-bound
//! operations hash onto a fixed thread so all work for one partition is
//! serialized, while partition-less operations run straight on the calling
//! thread. After execution the outcome is wrapped in a response envelope
//! and fed to the handler the invocation installed.

mod delayed;
mod pool;

pub use delayed::DelayedExecutor;
pub use pool::{Task, TaskPool};

use ferrite_core::{
    FerriteError, Operation, OperationExecutor, PartitionId, Response, ResponseValue,
};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::sync::Arc;
use tracing::warn;

thread_local! {
    /// Index of the partition thread the current thread is, if any.
    static OPERATION_THREAD_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

fn current_thread_index() -> Option<usize> {
    OPERATION_THREAD_INDEX.with(Cell::get)
}

enum OpMessage {
    Run(Arc<dyn Operation>),
    Terminate,
}

/// Execute an operation and deliver its outcome to the installed handler.
///
/// A successful execution produces a `NormalResponse` carrying the sync
/// backup count of backup-aware operations; a failure produces an
/// `ErrorResponse`. Delivery problems are logged, not raised; the
/// executing thread has nobody to raise to.
pub fn run_operation(op: &Arc<dyn Operation>) {
    let response = match op.execute() {
        Ok(payload) => {
            let backups = op.backup_aware().map_or(0, |b| b.sync_backup_count());
            Response::normal(ResponseValue::from_payload(payload), backups)
        }
        Err(error) => Response::error(error),
    };

    match op.state().response_handler() {
        Some(handler) => {
            if let Err(error) = handler.send_response(response) {
                warn!(operation = op.name(), error = %error, "response could not be delivered");
            }
        }
        None => {
            let error = FerriteError::NoResponseHandler {
                operation: op.name().to_string(),
            };
            warn!(operation = op.name(), error = %error, "dropping operation outcome");
        }
    }
}

/// Operation threads with per-partition routing.
pub struct PartitionExecutor {
    senders: Vec<mpsc::Sender<OpMessage>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PartitionExecutor {
    /// Spawn `thread_count` operation threads (at least one).
    #[must_use]
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let mut senders = Vec::with_capacity(thread_count);
        let mut workers = Vec::with_capacity(thread_count);

        for index in 0..thread_count {
            let (sender, receiver) = mpsc::channel::<OpMessage>();
            senders.push(sender);
            let handle = thread::Builder::new()
                .name(format!("ferrite-operation-{}", index))
                .spawn(move || {
                    OPERATION_THREAD_INDEX.with(|cell| cell.set(Some(index)));
                    while let Ok(message) = receiver.recv() {
                        match message {
                            OpMessage::Run(op) => run_operation(&op),
                            OpMessage::Terminate => break,
                        }
                    }
                })
                .expect("operation thread spawn should not fail");
            workers.push(handle);
        }

        Self {
            senders,
            workers: Mutex::new(workers),
        }
    }

    /// Spawn the operation threads configured for the engine.
    #[must_use]
    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self::new(config.operation_thread_count)
    }

    /// Number of operation threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.senders.len()
    }

    fn thread_index(&self, partition_id: PartitionId) -> usize {
        partition_id.as_u32() as usize % self.senders.len()
    }

    /// Stop every operation thread after its queued work drains.
    /// Idempotent.
    pub fn shutdown(&self) {
        for sender in &self.senders {
            let _ = sender.send(OpMessage::Terminate);
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
    }
}

impl Drop for PartitionExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl OperationExecutor for PartitionExecutor {
    fn is_invocation_allowed(&self, op: &dyn Operation, is_async: bool) -> bool {
        match current_thread_index() {
            // Any non-operation thread may invoke.
            None => true,
            Some(index) => {
                if is_async {
                    return true;
                }
                // A blocking invocation from an operation thread is only
                // safe when the operation maps onto this very thread;
                // anything else can deadlock the queue it waits on.
                match op.state().partition_id() {
                    Some(partition_id) => self.thread_index(partition_id) == index,
                    None => false,
                }
            }
        }
    }

    fn run_on_calling_thread_if_possible(&self, op: Arc<dyn Operation>) {
        match op.state().partition_id() {
            Some(partition_id) => {
                let index = self.thread_index(partition_id);
                if current_thread_index() == Some(index) {
                    run_operation(&op);
                } else if self.senders[index].send(OpMessage::Run(op)).is_err() {
                    warn!("operation submitted after executor shutdown was dropped");
                }
            }
            None => run_operation(&op),
        }
    }
}
