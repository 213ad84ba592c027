//! FERRITE Cluster View
//!
//! This crate provides the local node's view onto the cluster: who the
//! members are, what the cluster time is, and which member owns each
//! partition replica. The view is *fed* by an external membership layer;
//! nothing here gossips or votes.
//!
//! The invocation engine consumes the view through the `ClusterView` and
//! `PartitionView` traits from `ferrite-core`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod membership;
pub mod partition;

pub use clock::ClusterClock;
pub use config::ClusterConfig;
pub use membership::ClusterRegistry;
pub use partition::PartitionTable;
