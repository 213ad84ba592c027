//! Read-side contracts onto cluster membership and the partition table.
//!
//! The engine only observes the cluster; membership changes arrive through
//! whatever layer feeds the implementations of these traits.

use crate::types::{Address, Member, PartitionId, ReplicaIndex};

/// Membership and cluster-time view consumed by the invocation engine.
pub trait ClusterView: Send + Sync {
    /// Look up the member at an address, if it is currently in the cluster.
    fn member(&self, address: &Address) -> Option<Member>;

    /// Snapshot of the current membership.
    fn members(&self) -> Vec<Member>;

    /// Current cluster time in milliseconds.
    ///
    /// Invocation timestamps use cluster time, not the local wall clock,
    /// so timeout arithmetic agrees across members.
    fn cluster_time_millis(&self) -> i64;
}

/// Partition-routing view consumed by the invocation engine.
pub trait PartitionView: Send + Sync {
    /// Number of partitions in the grid.
    fn partition_count(&self) -> u32;

    /// Address of the member owning a given replica of a partition, if one
    /// is assigned.
    fn replica_address(
        &self,
        partition_id: PartitionId,
        replica_index: ReplicaIndex,
    ) -> Option<Address>;
}
