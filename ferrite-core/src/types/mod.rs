//! Strongly-typed identifiers and cluster primitives.

mod address;
mod ids;
mod member;

pub use address::Address;
pub use ids::{CallId, MemberUuid, PartitionId, ReplicaIndex};
pub use member::{LocalNode, Member};
