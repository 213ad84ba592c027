//! Process-wide mapping from call id to live invocation.
//!
//! Every dispatch attempt registers the invocation under a fresh call id so
//! inbound responses can be routed back to it. The entry holds the only
//! engine-side strong reference: between a remote send and its response the
//! registry is what keeps the invocation alive. Deregistration happens on
//! the single completion path.

use crate::invocation::Invocation;
use dashmap::DashMap;
use ferrite_core::CallId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry of in-flight invocations, keyed by call id.
pub struct InvocationRegistry {
    invocations: DashMap<u64, Arc<Invocation>>,
    call_id_sequence: AtomicU64,
}

impl InvocationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocations: DashMap::new(),
            call_id_sequence: AtomicU64::new(0),
        }
    }

    /// Register an invocation attempt under a fresh call id.
    ///
    /// A retried invocation is still registered under its previous attempt's
    /// call id; that entry is replaced so stale responses cannot route to it.
    pub fn register(&self, invocation: &Arc<Invocation>) -> CallId {
        let previous = invocation.op().state().call_id();
        if previous.is_set() {
            self.invocations.remove(&previous.as_u64());
        }

        let call_id = CallId::new(self.call_id_sequence.fetch_add(1, Ordering::Relaxed) + 1);
        invocation.op().state().set_call_id(call_id);
        self.invocations
            .insert(call_id.as_u64(), Arc::clone(invocation));
        call_id
    }

    /// Remove the invocation's current entry, if any.
    pub fn deregister(&self, invocation: &Invocation) {
        let call_id = invocation.op().state().call_id();
        if call_id.is_set() {
            self.invocations.remove(&call_id.as_u64());
        }
    }

    /// Look up a live invocation by call id.
    #[must_use]
    pub fn get(&self, call_id: CallId) -> Option<Arc<Invocation>> {
        self.invocations
            .get(&call_id.as_u64())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live invocations.
    #[must_use]
    pub fn size(&self) -> usize {
        self.invocations.len()
    }

    /// Visit every live invocation; used by the monitor sweep.
    ///
    /// Visits a snapshot: the callback may complete or re-register the
    /// invocation, which mutates the map under our feet otherwise.
    pub fn scan(&self, mut visit: impl FnMut(&Arc<Invocation>)) {
        let snapshot: Vec<Arc<Invocation>> = self
            .invocations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for invocation in &snapshot {
            visit(invocation);
        }
    }
}

impl Default for InvocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
