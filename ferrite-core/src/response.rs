//! Response envelopes sent from an operation's target back to its invoker.
//!
//! Four envelopes exist on the wire: a normal result (with the number of
//! sync backups the invoker must wait for), an error, a call-timeout signal
//! from a wait queue, and a backup acknowledgement. The invocation engine
//! classifies them in `Invocation::notify`.

use crate::error::FerriteError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried by a completed invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseValue {
    /// The operation completed without producing a value.
    Null,
    /// Raw serialized payload, returned as-is.
    Data(Bytes),
    /// Payload deserialized by the engine on behalf of the caller.
    Json(serde_json::Value),
}

impl ResponseValue {
    /// Build a value from an optional payload, mapping `None` to `Null`.
    #[must_use]
    pub fn from_payload(payload: Option<Bytes>) -> Self {
        match payload {
            Some(data) => Self::Data(data),
            None => Self::Null,
        }
    }

    /// Whether this is the null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The raw payload, if this value still carries one.
    #[must_use]
    pub fn as_data(&self) -> Option<&Bytes> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// The deserialized payload, if the engine decoded it.
    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Data(data) => write!(f, "data[{} bytes]", data.len()),
            Self::Json(value) => write!(f, "{}", value),
        }
    }
}

/// What an invocation ultimately resolves to.
pub type InvocationResult = std::result::Result<ResponseValue, FerriteError>;

/// A regular result from the primary replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalResponse {
    /// The operation's result value.
    pub value: ResponseValue,
    /// Number of sync backup acknowledgements the invoker must wait for.
    pub backup_count: u8,
}

impl NormalResponse {
    /// Create a normal response.
    #[must_use]
    pub fn new(value: ResponseValue, backup_count: u8) -> Self {
        Self {
            value,
            backup_count,
        }
    }
}

/// A failure reported by the execution side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The failure that terminated execution.
    pub cause: FerriteError,
}

impl ErrorResponse {
    /// Create an error response.
    #[must_use]
    pub fn new(cause: FerriteError) -> Self {
        Self { cause }
    }
}

/// The operation sat in a wait queue past its call timeout.
///
/// This is not a failure: the invoker debits the wait budget and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTimeoutResponse;

/// One backup replica acknowledged a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupAckResponse;

/// Union of every envelope a target can send for a call id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Regular result from the primary.
    Normal(NormalResponse),
    /// Execution failed.
    Error(ErrorResponse),
    /// Wait queue call-timeout signal.
    CallTimeout(CallTimeoutResponse),
    /// Backup acknowledgement.
    BackupAck(BackupAckResponse),
}

impl Response {
    /// Build a normal response envelope.
    #[must_use]
    pub fn normal(value: ResponseValue, backup_count: u8) -> Self {
        Self::Normal(NormalResponse::new(value, backup_count))
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(cause: FerriteError) -> Self {
        Self::Error(ErrorResponse::new(cause))
    }

    /// Build a call-timeout envelope.
    #[must_use]
    pub fn call_timeout() -> Self {
        Self::CallTimeout(CallTimeoutResponse)
    }

    /// Build a backup acknowledgement envelope.
    #[must_use]
    pub fn backup_ack() -> Self {
        Self::BackupAck(BackupAckResponse)
    }
}
