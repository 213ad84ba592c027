//! Core abstractions shared by the invocation engine and its collaborators.

mod cluster;
mod executor;
mod operation;

pub use cluster::{ClusterView, PartitionView};
pub use executor::{OperationExecutor, Transport};
pub use operation::{BackupAware, Operation, OperationState, ResponseHandler, WaitSupport};
