//! Membership registry.
//!
//! Holds the set of members the local node currently believes are in the
//! cluster. An external membership layer applies joins and leaves; the
//! invocation engine reads through the `ClusterView` trait to validate
//! targets and to detect members that died during a backup window.

use crate::clock::ClusterClock;
use ferrite_core::{Address, ClusterView, Member};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Thread-safe membership map with a monotonically increasing version.
pub struct ClusterRegistry {
    members: RwLock<HashMap<Address, Member>>,
    version: AtomicU64,
    clock: Arc<ClusterClock>,
}

impl ClusterRegistry {
    /// Create an empty registry sharing the given cluster clock.
    #[must_use]
    pub fn new(clock: Arc<ClusterClock>) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            clock,
        }
    }

    /// Apply a member join.
    ///
    /// Replaces any record previously held for the same address, which is
    /// how a restarted member (same address, new uuid) is observed.
    pub fn add_member(&self, member: Member) {
        info!(member = %member, "member joined");
        self.members.write().insert(member.address.clone(), member);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Apply a member leave. Returns the removed record, if any.
    pub fn remove_member(&self, address: &Address) -> Option<Member> {
        let removed = self.members.write().remove(address);
        if let Some(member) = &removed {
            info!(member = %member, "member left");
            self.version.fetch_add(1, Ordering::Release);
        }
        removed
    }

    /// Number of members currently known.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.read().len()
    }

    /// Version of the membership view; bumps on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The shared cluster clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<ClusterClock> {
        &self.clock
    }
}

impl ClusterView for ClusterRegistry {
    fn member(&self, address: &Address) -> Option<Member> {
        self.members.read().get(address).cloned()
    }

    fn members(&self) -> Vec<Member> {
        self.members.read().values().cloned().collect()
    }

    fn cluster_time_millis(&self) -> i64 {
        self.clock.cluster_time_millis()
    }
}
