//! Cluster member records and the local node handle.

use super::{Address, MemberUuid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A member of the cluster as seen by the local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The member's address.
    pub address: Address,
    /// The member's uuid, stable for its lifetime in the cluster.
    pub uuid: MemberUuid,
}

impl Member {
    /// Create a new member record.
    #[must_use]
    pub fn new(address: Address, uuid: MemberUuid) -> Self {
        Self { address, uuid }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member[{}]({})", self.address, self.uuid)
    }
}

/// Identity and liveness of the node this engine runs on.
///
/// The active flag is flipped exactly once at shutdown; every invocation
/// checks it before dispatching.
#[derive(Debug)]
pub struct LocalNode {
    member: Member,
    active: AtomicBool,
}

impl LocalNode {
    /// Create a handle for an active local node.
    #[must_use]
    pub fn new(address: Address, uuid: MemberUuid) -> Self {
        Self {
            member: Member::new(address, uuid),
            active: AtomicBool::new(true),
        }
    }

    /// The local member record.
    #[must_use]
    pub fn member(&self) -> &Member {
        &self.member
    }

    /// The local member's address.
    #[must_use]
    pub fn this_address(&self) -> &Address {
        &self.member.address
    }

    /// The local member's uuid.
    #[must_use]
    pub fn uuid(&self) -> MemberUuid {
        self.member.uuid
    }

    /// Whether the node is accepting invocations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the node active or inactive.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_node_starts_active() {
        let node = LocalNode::new(Address::new("127.0.0.1", 5701), MemberUuid::new());
        assert!(node.is_active());
        node.set_active(false);
        assert!(!node.is_active());
    }

    #[test]
    fn member_display() {
        let member = Member::new(Address::new("127.0.0.1", 5701), MemberUuid::new());
        let text = format!("{}", member);
        assert!(text.starts_with("Member[127.0.0.1:5701]"));
    }
}
