//! FERRITE Core Library
//!
//! This crate provides the foundational types, traits, and wire envelopes
//! for the FERRITE in-memory data grid.
//!
//! # Overview
//!
//! FERRITE partitions its data across cluster members and executes typed
//! operations against partition replicas. This crate holds everything the
//! invocation engine and its collaborators agree on:
//!
//! - **Types**: strongly-typed identifiers (`CallId`, `PartitionId`,
//!   `ReplicaIndex`, `MemberUuid`), member addresses, and the local node
//!   handle
//! - **Errors**: the `FerriteError` taxonomy with stable error codes and
//!   retry classification
//! - **Responses**: the wire envelopes a target sends back to an invoker
//! - **Traits**: the seams between the engine and the rest of the node
//!   (operations, cluster view, partition table, executors, transport)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod prelude;
pub mod response;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use error::{FerriteError, Result};
pub use response::{
    BackupAckResponse, CallTimeoutResponse, ErrorResponse, InvocationResult, NormalResponse,
    Response, ResponseValue,
};
pub use traits::{
    BackupAware, ClusterView, Operation, OperationExecutor, OperationState, PartitionView,
    ResponseHandler, Transport, WaitSupport,
};
pub use types::{Address, CallId, LocalNode, Member, MemberUuid, PartitionId, ReplicaIndex};
