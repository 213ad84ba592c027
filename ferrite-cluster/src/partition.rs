//! Partition table.
//!
//! Maps every partition to the addresses of its replicas. Replica index 0
//! is the primary. Assignments are written by the (external) migration
//! layer; the invocation engine reads them during target resolution.

use crate::config::ClusterConfig;
use ferrite_core::{Address, FerriteError, PartitionId, PartitionView, ReplicaIndex, Result};
use parking_lot::RwLock;
use tracing::debug;

/// Replica assignments for one partition.
#[derive(Debug, Clone)]
struct PartitionEntry {
    replicas: Vec<Option<Address>>,
}

impl PartitionEntry {
    fn empty(max_replica_count: u8) -> Self {
        Self {
            replicas: vec![None; usize::from(max_replica_count)],
        }
    }
}

/// Thread-safe replica table for every partition in the grid.
pub struct PartitionTable {
    entries: RwLock<Vec<PartitionEntry>>,
    max_replica_count: u8,
}

impl PartitionTable {
    /// Create a table with no assignments.
    #[must_use]
    pub fn new(config: &ClusterConfig) -> Self {
        let entries = (0..config.partition_count)
            .map(|_| PartitionEntry::empty(config.max_replica_count))
            .collect();
        Self {
            entries: RwLock::new(entries),
            max_replica_count: config.max_replica_count,
        }
    }

    /// Assign the owner (primary replica) of a partition.
    ///
    /// # Errors
    ///
    /// Returns an error when the partition id is out of range.
    pub fn set_owner(&self, partition_id: PartitionId, owner: Address) -> Result<()> {
        self.set_replica(partition_id, ReplicaIndex::PRIMARY, Some(owner))
    }

    /// Assign or clear one replica slot of a partition.
    ///
    /// # Errors
    ///
    /// Returns an error when the partition id or replica index is out of
    /// range.
    pub fn set_replica(
        &self,
        partition_id: PartitionId,
        replica_index: ReplicaIndex,
        address: Option<Address>,
    ) -> Result<()> {
        if usize::from(replica_index.as_u8()) >= usize::from(self.max_replica_count) {
            return Err(FerriteError::ReplicaOutOfRange {
                replica_index: replica_index.as_u8(),
                max_replica_count: self.max_replica_count,
            });
        }
        let mut entries = self.entries.write();
        let partition_count = entries.len() as u32;
        let entry = entries.get_mut(partition_id.as_u32() as usize).ok_or(
            FerriteError::PartitionOutOfRange {
                partition_id: partition_id.as_u32(),
                partition_count,
            },
        )?;
        debug!(partition = %partition_id, replica = %replica_index, address = ?address, "replica assignment changed");
        entry.replicas[usize::from(replica_index.as_u8())] = address;
        Ok(())
    }

    /// Remove a member from every replica slot it occupies.
    ///
    /// Used when a member dies before the migration layer has produced a
    /// new assignment; affected slots become unassigned.
    pub fn clear_member(&self, address: &Address) {
        let mut entries = self.entries.write();
        for entry in entries.iter_mut() {
            for slot in entry.replicas.iter_mut() {
                if slot.as_ref() == Some(address) {
                    *slot = None;
                }
            }
        }
    }

    /// Maximum replicas per partition, primary included.
    #[must_use]
    pub fn max_replica_count(&self) -> u8 {
        self.max_replica_count
    }
}

impl PartitionView for PartitionTable {
    fn partition_count(&self) -> u32 {
        self.entries.read().len() as u32
    }

    fn replica_address(
        &self,
        partition_id: PartitionId,
        replica_index: ReplicaIndex,
    ) -> Option<Address> {
        let entries = self.entries.read();
        entries
            .get(partition_id.as_u32() as usize)?
            .replicas
            .get(usize::from(replica_index.as_u8()))?
            .clone()
    }
}
