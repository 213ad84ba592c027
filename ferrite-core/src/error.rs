//! Error types for FERRITE.
//!
//! This module provides strongly-typed errors with actionable context.
//! Errors that may travel back to a remote invoker derive `Serialize`,
//! and every variant is `Clone` so a terminal error can be handed to each
//! waiter on an invocation future.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for FERRITE operations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FerriteError {
    // =========================================================================
    // Invocation Errors (E100-E199)
    // =========================================================================
    /// The invocation's public entry point was called a second time.
    #[error("E101: Invocation already invoked: {invocation}")]
    AlreadyInvoked {
        /// Description of the offending invocation.
        invocation: String,
    },

    /// The operation already carries a call id from a previous invocation.
    #[error("E102: Operation '{operation}' already used by {call_id}; operations cannot be shared across invocations")]
    OperationReused {
        /// Name of the operation.
        operation: String,
        /// The call id the operation is still bound to.
        call_id: u64,
    },

    /// The calling thread is not allowed to make a blocking invocation.
    #[error("E103: Thread '{thread}' cannot invoke '{operation}' from its current context")]
    ThreadNotAllowed {
        /// Name of the calling thread.
        thread: String,
        /// Name of the operation.
        operation: String,
    },

    /// The operation's partition id does not match the invocation's.
    #[error("E104: Partition id of operation ({operation_partition}) does not match invocation ({invocation_partition})")]
    PartitionMismatch {
        /// Partition id carried by the operation.
        operation_partition: i64,
        /// Partition id of the invocation.
        invocation_partition: i64,
    },

    /// The operation's replica index does not match the invocation's.
    #[error("E105: Replica index of operation ({operation_replica}) does not match invocation ({invocation_replica})")]
    ReplicaMismatch {
        /// Replica index carried by the operation.
        operation_replica: i64,
        /// Replica index of the invocation.
        invocation_replica: i64,
    },

    /// A second response was sent for the same execution attempt.
    #[error("E106: Response already sent for {invocation}")]
    ResponseAlreadySent {
        /// Description of the invocation that already responded.
        invocation: String,
    },

    /// An operation tried to respond but no handler was installed.
    #[error("E107: No response handler installed for operation '{operation}'")]
    NoResponseHandler {
        /// Name of the operation.
        operation: String,
    },

    // =========================================================================
    // Target/Transport Errors (E200-E299)
    // =========================================================================
    /// A transient I/O failure worth retrying.
    #[error("E201: Retryable I/O failure: {cause}")]
    RetryableIo {
        /// Description of the failure.
        cause: String,
    },

    /// The resolved target cannot serve this partition replica.
    #[error("E202: Wrong target {target:?} from {this_address} for partition {partition_id} replica {replica_index}, operation '{operation}' of service '{service}'")]
    WrongTarget {
        /// Address of the resolving node.
        this_address: Address,
        /// The resolved target, if any.
        target: Option<Address>,
        /// Partition addressed by the invocation, -1 when target-bound.
        partition_id: i64,
        /// Replica index addressed by the invocation.
        replica_index: i64,
        /// Name of the operation.
        operation: String,
        /// Service that owns the operation.
        service: String,
    },

    /// The resolved target is not a member of the cluster.
    #[error("E203: Target {target} is not a cluster member, partition {partition_id}, operation '{operation}' of service '{service}'")]
    TargetNotMember {
        /// The non-member target.
        target: Address,
        /// Partition addressed by the invocation, -1 when target-bound.
        partition_id: i64,
        /// Name of the operation.
        operation: String,
        /// Service that owns the operation.
        service: String,
    },

    /// A member left the cluster while an operation was in flight on it.
    #[error("E204: Member {address} left the cluster while an operation was running on it")]
    MemberLeft {
        /// Address of the departed member.
        address: Address,
    },

    /// The local node is shutting down or not yet started.
    #[error("E205: Grid instance is not active")]
    InstanceNotActive,

    /// The target parked the operation in a wait queue; keep waiting.
    #[error("E206: Operation is parked in a wait queue of service '{service}'; caller should keep waiting")]
    WaitKeepAlive {
        /// Service whose wait queue holds the operation.
        service: String,
    },

    /// A partition id beyond the configured partition count.
    #[error("E207: Partition {partition_id} is out of range, partition count is {partition_count}")]
    PartitionOutOfRange {
        /// The offending partition id.
        partition_id: u32,
        /// Configured number of partitions.
        partition_count: u32,
    },

    /// A replica index beyond the configured replica count.
    #[error("E208: Replica index {replica_index} is out of range, max replica count is {max_replica_count}")]
    ReplicaOutOfRange {
        /// The offending replica index.
        replica_index: u8,
        /// Configured replicas per partition.
        max_replica_count: u8,
    },

    // =========================================================================
    // Timeout Errors (E300-E399)
    // =========================================================================
    /// No usable response arrived within the invocation's call timeout.
    #[error("E301: {message}")]
    OperationTimeout {
        /// Detail including backup bookkeeping at the time of expiry.
        message: String,
    },

    /// A blocking wait on an invocation future hit its own deadline.
    #[error("E302: No response after waiting {waited_millis} ms for the invocation future")]
    FutureTimeout {
        /// How long the waiter blocked.
        waited_millis: u64,
    },

    /// The waiting caller was interrupted before a response arrived.
    #[error("E303: Invocation was interrupted while waiting for a response")]
    Interrupted,

    // =========================================================================
    // Serialization Errors (E400-E499)
    // =========================================================================
    /// A response payload could not be deserialized.
    #[error("E401: Failed to deserialize response payload: {cause}")]
    Serialization {
        /// Description of the decode failure.
        cause: String,
    },

    // =========================================================================
    // Remote Errors (E500-E599)
    // =========================================================================
    /// An unclassified failure reported by the remote execution side.
    #[error("E501: Remote execution failed: {message}")]
    Remote {
        /// Message reported by the remote side.
        message: String,
    },
}

impl FerriteError {
    /// Get the error code (e.g., "E201").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInvoked { .. } => "E101",
            Self::OperationReused { .. } => "E102",
            Self::ThreadNotAllowed { .. } => "E103",
            Self::PartitionMismatch { .. } => "E104",
            Self::ReplicaMismatch { .. } => "E105",
            Self::ResponseAlreadySent { .. } => "E106",
            Self::NoResponseHandler { .. } => "E107",
            Self::RetryableIo { .. } => "E201",
            Self::WrongTarget { .. } => "E202",
            Self::TargetNotMember { .. } => "E203",
            Self::MemberLeft { .. } => "E204",
            Self::InstanceNotActive => "E205",
            Self::WaitKeepAlive { .. } => "E206",
            Self::PartitionOutOfRange { .. } => "E207",
            Self::ReplicaOutOfRange { .. } => "E208",
            Self::OperationTimeout { .. } => "E301",
            Self::FutureTimeout { .. } => "E302",
            Self::Interrupted => "E303",
            Self::Serialization { .. } => "E401",
            Self::Remote { .. } => "E501",
        }
    }

    /// Check if this error is worth another invocation attempt.
    ///
    /// Retriable errors are transient transport or routing faults; the
    /// exception policy turns them into a retry while the attempt budget
    /// lasts.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RetryableIo { .. }
                | Self::WrongTarget { .. }
                | Self::TargetNotMember { .. }
                | Self::MemberLeft { .. }
        )
    }

    /// Check if this error tells a wait-aware caller to keep waiting.
    #[must_use]
    pub fn keeps_waiting(&self) -> bool {
        matches!(self, Self::WaitKeepAlive { .. })
    }
}

/// Result type alias using `FerriteError`.
pub type Result<T> = std::result::Result<T, FerriteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = FerriteError::RetryableIo {
            cause: "connection reset".to_string(),
        };
        assert_eq!(err.code(), "E201");

        let err = FerriteError::OperationTimeout {
            message: "no response".to_string(),
        };
        assert_eq!(err.code(), "E301");
    }

    #[test]
    fn error_display_includes_code() {
        let err = FerriteError::InstanceNotActive;
        assert!(format!("{}", err).contains("E205"));
    }

    #[test]
    fn retriable_errors() {
        assert!(
            FerriteError::TargetNotMember {
                target: Address::new("10.0.0.9", 5701),
                partition_id: 3,
                operation: "map.put".to_string(),
                service: "map".to_string(),
            }
            .is_retriable()
        );

        assert!(!FerriteError::InstanceNotActive.is_retriable());
        assert!(!FerriteError::Interrupted.is_retriable());
    }

    #[test]
    fn wait_keep_alive_classification() {
        let err = FerriteError::WaitKeepAlive {
            service: "lock".to_string(),
        };
        assert!(err.keeps_waiting());
        assert!(!err.is_retriable());
    }

    #[test]
    fn wire_roundtrip() {
        let err = FerriteError::MemberLeft {
            address: Address::new("10.0.0.2", 5702),
        };
        let encoded = serde_json::to_vec(&err).unwrap();
        let decoded: FerriteError = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, err);
    }
}
