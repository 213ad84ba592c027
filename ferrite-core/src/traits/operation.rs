//! The operation abstraction and its engine-visible header.
//!
//! The invocation engine never interprets what an operation does; it only
//! reads and writes the bookkeeping header (`OperationState`) that every
//! operation embeds, and calls `execute` when the operation runs locally.

use crate::error::Result;
use crate::response::Response;
use crate::types::{Address, CallId, MemberUuid, PartitionId, ReplicaIndex};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Sink for the outcome of an operation execution.
///
/// For local executions the engine installs the invocation itself as the
/// handler; on the remote side a transport-backed handler takes its place.
pub trait ResponseHandler: Send + Sync {
    /// Deliver the outcome of one execution attempt.
    ///
    /// # Errors
    ///
    /// Returns `FerriteError::ResponseAlreadySent` when a response was
    /// already delivered for the current attempt.
    fn send_response(&self, response: Response) -> Result<()>;

    /// Whether this handler delivers into the local process.
    fn is_local(&self) -> bool {
        true
    }
}

/// Capability of operations that can park in a wait queue.
///
/// The wait timeout is the operation's own budget for staying parked and
/// is distinct from the invocation's call timeout. A negative value means
/// "wait forever".
pub trait WaitSupport {
    /// Remaining wait budget in milliseconds; negative means unbounded.
    fn wait_timeout_millis(&self) -> i64;

    /// Replace the remaining wait budget.
    fn set_wait_timeout_millis(&self, millis: i64);
}

/// Capability of mutating operations that replicate to backups.
pub trait BackupAware {
    /// Number of sync backup acknowledgements the invoker must wait for.
    fn sync_backup_count(&self) -> u8;
}

/// A unit of work dispatched against a partition replica or explicit target.
///
/// Implementations live in the data-structure services; the engine treats
/// them abstractly through this trait.
pub trait Operation: Send + Sync + fmt::Debug + 'static {
    /// The engine-visible bookkeeping header.
    fn state(&self) -> &OperationState;

    /// Stable name used in logs and error messages.
    fn name(&self) -> &str;

    /// Execute the operation on the local node.
    ///
    /// # Errors
    ///
    /// Any error is wrapped in an `ErrorResponse` and fed back to the
    /// invoker through the installed response handler.
    fn execute(&self) -> Result<Option<Bytes>>;

    /// Whether this is a cluster-join operation, exempt from membership
    /// checks during target resolution.
    fn is_join(&self) -> bool {
        false
    }

    /// Whether this is a partition-migration operation, exempt from the
    /// invoking-thread discipline.
    fn is_migration(&self) -> bool {
        false
    }

    /// Wait-queue capability, if the operation has one.
    fn wait_support(&self) -> Option<&dyn WaitSupport> {
        None
    }

    /// Backup-replication capability, if the operation has one.
    fn backup_aware(&self) -> Option<&dyn BackupAware> {
        None
    }
}

/// Bookkeeping header embedded in every operation.
///
/// All fields are interior-mutable: the engine stamps them during dispatch
/// while executor and network threads read them concurrently. The call id
/// is the reuse guard: it stays zero until the first registration and a
/// non-zero id blocks the operation from a second invocation.
pub struct OperationState {
    call_id: AtomicU64,
    partition_id: AtomicI64,
    replica_index: AtomicI64,
    call_timeout_millis: AtomicU64,
    invocation_time_millis: AtomicI64,
    wait_timeout_millis: AtomicI64,
    service_name: Mutex<Option<String>>,
    caller_address: Mutex<Option<Address>>,
    caller_uuid: Mutex<Option<MemberUuid>>,
    response_handler: Mutex<Option<Weak<dyn ResponseHandler>>>,
}

impl OperationState {
    /// Create a fresh header with nothing assigned.
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_id: AtomicU64::new(0),
            partition_id: AtomicI64::new(-1),
            replica_index: AtomicI64::new(0),
            call_timeout_millis: AtomicU64::new(0),
            invocation_time_millis: AtomicI64::new(-1),
            wait_timeout_millis: AtomicI64::new(-1),
            service_name: Mutex::new(None),
            caller_address: Mutex::new(None),
            caller_uuid: Mutex::new(None),
            response_handler: Mutex::new(None),
        }
    }

    /// The call id, `CallId::UNSET` until registration.
    #[must_use]
    pub fn call_id(&self) -> CallId {
        CallId::new(self.call_id.load(Ordering::Relaxed))
    }

    /// Bind the operation to a registered call id.
    pub fn set_call_id(&self, call_id: CallId) {
        self.call_id.store(call_id.as_u64(), Ordering::Relaxed);
    }

    /// The partition this operation is bound to, if any.
    #[must_use]
    pub fn partition_id(&self) -> Option<PartitionId> {
        let raw = self.partition_id.load(Ordering::Relaxed);
        u32::try_from(raw).ok().map(PartitionId::new)
    }

    /// Bind the operation to a partition.
    pub fn set_partition_id(&self, partition_id: PartitionId) {
        self.partition_id
            .store(i64::from(partition_id.as_u32()), Ordering::Relaxed);
    }

    /// The replica index this operation addresses.
    #[must_use]
    pub fn replica_index(&self) -> ReplicaIndex {
        let raw = self.replica_index.load(Ordering::Relaxed);
        ReplicaIndex::new(u8::try_from(raw).unwrap_or(0))
    }

    /// Bind the operation to a replica index.
    pub fn set_replica_index(&self, replica_index: ReplicaIndex) {
        self.replica_index
            .store(i64::from(replica_index.as_u8()), Ordering::Relaxed);
    }

    /// The per-attempt call timeout in milliseconds, 0 until stamped.
    #[must_use]
    pub fn call_timeout_millis(&self) -> u64 {
        self.call_timeout_millis.load(Ordering::Relaxed)
    }

    /// Stamp the per-attempt call timeout.
    pub fn set_call_timeout_millis(&self, millis: u64) {
        self.call_timeout_millis.store(millis, Ordering::Relaxed);
    }

    /// Cluster time at which the current attempt was dispatched, -1 until
    /// stamped.
    #[must_use]
    pub fn invocation_time_millis(&self) -> i64 {
        self.invocation_time_millis.load(Ordering::Relaxed)
    }

    /// Stamp the dispatch time of the current attempt.
    pub fn set_invocation_time_millis(&self, millis: i64) {
        self.invocation_time_millis.store(millis, Ordering::Relaxed);
    }

    /// Wait budget storage for `WaitSupport` implementations.
    #[must_use]
    pub fn wait_timeout_millis(&self) -> i64 {
        self.wait_timeout_millis.load(Ordering::Relaxed)
    }

    /// Replace the stored wait budget.
    pub fn set_wait_timeout_millis(&self, millis: i64) {
        self.wait_timeout_millis.store(millis, Ordering::Relaxed);
    }

    /// Service the operation belongs to.
    #[must_use]
    pub fn service_name(&self) -> Option<String> {
        self.service_name.lock().clone()
    }

    /// Bind the operation to its service.
    pub fn set_service_name(&self, name: impl Into<String>) {
        *self.service_name.lock() = Some(name.into());
    }

    /// Address of the invoking node.
    #[must_use]
    pub fn caller_address(&self) -> Option<Address> {
        self.caller_address.lock().clone()
    }

    /// Record the invoking node's address.
    pub fn set_caller_address(&self, address: Address) {
        *self.caller_address.lock() = Some(address);
    }

    /// Uuid of the invoking member.
    #[must_use]
    pub fn caller_uuid(&self) -> Option<MemberUuid> {
        *self.caller_uuid.lock()
    }

    /// Record the invoking member's uuid.
    pub fn set_caller_uuid(&self, uuid: MemberUuid) {
        *self.caller_uuid.lock() = Some(uuid);
    }

    /// The installed response handler, if it is still alive.
    ///
    /// The slot holds a weak reference: the invocation owns itself through
    /// the registry, and the operation must not keep it alive.
    #[must_use]
    pub fn response_handler(&self) -> Option<Arc<dyn ResponseHandler>> {
        self.response_handler
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Install the response handler for the next execution.
    pub fn set_response_handler(&self, handler: Weak<dyn ResponseHandler>) {
        *self.response_handler.lock() = Some(handler);
    }
}

impl Default for OperationState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationState")
            .field("call_id", &self.call_id())
            .field("partition_id", &self.partition_id())
            .field("replica_index", &self.replica_index())
            .field("call_timeout_millis", &self.call_timeout_millis())
            .field("invocation_time_millis", &self.invocation_time_millis())
            .field("service_name", &self.service_name())
            .finish()
    }
}
