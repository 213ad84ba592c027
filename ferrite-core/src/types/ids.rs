//! Strongly-typed identifiers for FERRITE entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation id assigned to a registered invocation.
///
/// A call id of zero means "not yet registered". The registry assigns a
/// fresh non-zero id on every dispatch attempt, and an operation whose call
/// id is non-zero can never be handed to a second invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(u64);

impl CallId {
    /// The unassigned sentinel.
    pub const UNSET: CallId = CallId(0);

    /// Create a call id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this call id has been assigned by the registry.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call_{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a data partition.
///
/// Partition ids are stable for the lifetime of the cluster; the partition
/// table maps each id to the addresses of its replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Create a partition id from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition_{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Which copy of a partition an operation addresses.
///
/// Replica index 0 is the primary; higher indices address backups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ReplicaIndex(u8);

impl ReplicaIndex {
    /// The primary replica.
    pub const PRIMARY: ReplicaIndex = ReplicaIndex(0);

    /// Create a replica index from a raw value.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Get the raw index value.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Whether this index addresses the primary replica.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ReplicaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica_{}", self.0)
    }
}

impl From<u8> for ReplicaIndex {
    fn from(index: u8) -> Self {
        Self(index)
    }
}

/// Unique identifier of a cluster member.
///
/// Assigned when a member joins and stable until it leaves. Stored as raw
/// bytes internally for cheap copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberUuid {
    bytes: [u8; 16],
}

impl MemberUuid {
    /// Create a new random member uuid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: *Uuid::new_v4().as_bytes(),
        }
    }

    /// Create a member uuid from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            bytes: *uuid.as_bytes(),
        }
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.bytes)
    }

    /// Parse a member uuid from a string.
    ///
    /// Returns `None` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self::from_uuid)
    }
}

impl Default for MemberUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member_{}", self.as_uuid())
    }
}

impl serde::Serialize for MemberUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_uuid().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for MemberUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let uuid = Uuid::deserialize(deserializer)?;
        Ok(Self::from_uuid(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_id_unset_sentinel() {
        assert!(!CallId::UNSET.is_set());
        assert!(CallId::new(1).is_set());
    }

    #[test]
    fn call_id_display() {
        assert_eq!(format!("{}", CallId::new(42)), "call_42");
    }

    #[test]
    fn replica_index_primary() {
        assert!(ReplicaIndex::PRIMARY.is_primary());
        assert!(!ReplicaIndex::new(1).is_primary());
    }

    #[test]
    fn member_uuid_uniqueness() {
        assert_ne!(MemberUuid::new(), MemberUuid::new());
    }

    #[test]
    fn member_uuid_roundtrip() {
        let id = MemberUuid::new();
        let restored = MemberUuid::from_uuid(id.as_uuid());
        assert_eq!(id, restored);
    }

    #[test]
    fn member_uuid_display() {
        let id = MemberUuid::new();
        assert!(format!("{}", id).starts_with("member_"));
    }

    #[test]
    fn partition_id_display() {
        assert_eq!(format!("{}", PartitionId::new(7)), "partition_7");
    }
}
