//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use ferrite_core::prelude::*;
//! ```

// Core types
pub use crate::types::{Address, CallId, LocalNode, Member, MemberUuid, PartitionId, ReplicaIndex};

// Error handling
pub use crate::error::{FerriteError, Result};

// Response envelopes
pub use crate::response::{
    BackupAckResponse, CallTimeoutResponse, ErrorResponse, InvocationResult, NormalResponse,
    Response, ResponseValue,
};

// Traits
pub use crate::traits::{
    BackupAware, ClusterView, Operation, OperationExecutor, OperationState, PartitionView,
    ResponseHandler, Transport, WaitSupport,
};
