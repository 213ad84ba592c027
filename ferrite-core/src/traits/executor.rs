//! Execution and transport contracts consumed by the invocation engine.

use crate::traits::Operation;
use crate::types::Address;
use std::sync::Arc;

/// Executes operations on the local node.
pub trait OperationExecutor: Send + Sync {
    /// Whether the current thread may start an invocation of `op`.
    ///
    /// Operation threads may not make blocking invocations that would
    /// deadlock their own queue; async invocations are less restricted.
    fn is_invocation_allowed(&self, op: &dyn Operation, is_async: bool) -> bool;

    /// Run the operation on the calling thread when the threading rules
    /// allow it, otherwise enqueue it on the right operation thread.
    fn run_on_calling_thread_if_possible(&self, op: Arc<dyn Operation>);
}

/// Sends operations to remote members.
pub trait Transport: Send + Sync {
    /// Hand the operation to the wire layer for delivery to `target`.
    ///
    /// Returns `false` when the transport refuses the send (no connection,
    /// full queue); the engine maps refusal to a retryable I/O failure.
    fn send(&self, op: &Arc<dyn Operation>, target: &Address) -> bool;
}
