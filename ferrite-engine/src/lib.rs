//! FERRITE Invocation Engine
//!
//! This crate dispatches typed operations against the FERRITE data grid
//! and drives them to completion: it resolves the target member for a
//! partition replica (or takes an explicit address), registers the
//! invocation for response routing, waits for the primary response and any
//! backup acknowledgements, enforces call timeouts, and retries on
//! recoverable faults.
//!
//! # Key Components
//!
//! - **Invocation**: the per-operation state machine
//! - **InvocationFuture**: single-assignment result cell with blocking
//!   wait, deadline, interrupt, and callback completion
//! - **InvocationRegistry**: call-id to invocation routing table
//! - **InvocationMonitor**: background sweep driving call and backup
//!   timeouts
//! - **PartitionExecutor**: local operation threads with per-partition
//!   routing
//! - **OperationService**: the façade wiring all of it together
//!
//! # Example
//!
//! ```ignore
//! use ferrite_engine::{EngineConfig, OperationService};
//!
//! let service = OperationService::new(
//!     EngineConfig::from_env(),
//!     node,
//!     cluster,
//!     partitions,
//!     executor,
//!     transport,
//! );
//!
//! let future = service
//!     .invoke_on_partition("map", op, partition_id)
//!     .with_try_count(3)
//!     .invoke()?;
//! let value = future.get(Duration::from_secs(10))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod executor;
pub mod future;
pub mod invocation;
pub mod monitor;
pub mod registry;
pub mod service;

// Re-export key types at crate root for convenience
pub use config::EngineConfig;
pub use executor::{DelayedExecutor, PartitionExecutor, TaskPool};
pub use future::{CompletionCallback, InvocationFuture};
pub use invocation::{ExceptionAction, ExceptionPolicy, Invocation, InvocationMode};
pub use monitor::InvocationMonitor;
pub use registry::InvocationRegistry;
pub use service::{InvocationBuilder, NodeServices, OperationService};
