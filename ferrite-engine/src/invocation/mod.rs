//! The invocation state machine.
//!
//! An `Invocation` drives one operation to completion: it resolves the
//! target, registers itself for response routing, dispatches locally or
//! remotely, and reacts to every signal that comes back: primary
//! responses, backup acknowledgements, wait-queue timeouts, and monitor
//! sweeps. Retries re-enter through [`Invocation::run`].
//!
//! There is no lock around the invocation. Concurrent notifications from
//! executor, network, replication, and monitor threads synchronize on
//! individual atomic fields, and every completion path funnels into one
//! idempotent set on the future.

mod notify;
mod policy;

pub use policy::{ExceptionAction, ExceptionPolicy};

use crate::future::{CompletionCallback, InvocationFuture};
use crate::service::NodeServices;
use arc_swap::ArcSwapOption;
use ferrite_core::{
    Address, FerriteError, Member, Operation, PartitionId, ReplicaIndex, Response, ResponseHandler,
    ResponseValue, Result,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Floor applied when a call timeout is derived from a wait timeout.
const MIN_TIMEOUT_MILLIS: u64 = 10_000;
/// Retries below this attempt count skip the pause and go straight to the
/// retry pool.
const MAX_FAST_INVOCATION_COUNT: u32 = 5;
/// Attempt count past which retry logging is throttled.
const LOG_MAX_INVOCATION_COUNT: u32 = 99;
/// One in this many throttled retries is logged.
const LOG_INVOCATION_COUNT_MOD: u32 = 10;

/// How an invocation picks its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationMode {
    /// Route through the partition table to a replica of a partition.
    Partitioned {
        /// The partition the operation addresses.
        partition_id: PartitionId,
        /// Which replica of the partition, 0 = primary.
        replica_index: ReplicaIndex,
    },
    /// Send to an explicit member address.
    Targeted {
        /// The destination address.
        address: Address,
    },
}

impl InvocationMode {
    /// The partition addressed, if partition-routed.
    #[must_use]
    pub fn partition_id(&self) -> Option<PartitionId> {
        match self {
            Self::Partitioned { partition_id, .. } => Some(*partition_id),
            Self::Targeted { .. } => None,
        }
    }

    fn partition_id_i64(&self) -> i64 {
        self.partition_id().map_or(-1, |p| i64::from(p.as_u32()))
    }

    fn replica_index_i64(&self) -> i64 {
        match self {
            Self::Partitioned { replica_index, .. } => i64::from(replica_index.as_u8()),
            Self::Targeted { .. } => 0,
        }
    }
}

/// Where the current attempt was sent.
#[derive(Debug, Clone)]
struct ResolvedTarget {
    address: Address,
    member: Option<Member>,
}

/// Per-invocation knobs collected by the builder.
pub(crate) struct InvocationParams {
    pub try_count: u32,
    pub try_pause_millis: u64,
    /// 0 means "derive from the operation and the engine default".
    pub call_timeout_millis: u64,
    pub result_deserialized: bool,
    pub callback: Option<CompletionCallback>,
    pub policy: Option<Arc<ExceptionPolicy>>,
}

/// One execution attempt chain for an operation, including retries.
///
/// Created through [`OperationService::invoke_on_partition`] or
/// [`OperationService::invoke_on_target`]; owns the result future.
///
/// [`OperationService::invoke_on_partition`]: crate::service::OperationService::invoke_on_partition
/// [`OperationService::invoke_on_target`]: crate::service::OperationService::invoke_on_target
pub struct Invocation {
    services: Arc<NodeServices>,
    service_name: String,
    op: Arc<dyn Operation>,
    mode: InvocationMode,
    try_count: u32,
    try_pause_millis: u64,
    call_timeout_millis: u64,
    result_deserialized: bool,
    future: Arc<InvocationFuture>,
    policy: Option<Arc<ExceptionPolicy>>,
    self_ref: Weak<Invocation>,

    invoke_count: AtomicU32,
    response_received: AtomicBool,
    remote: AtomicBool,
    backups_expected: AtomicU32,
    backups_completed: AtomicU32,
    pending_response: ArcSwapOption<ResponseValue>,
    pending_response_received_millis: AtomicI64,
    target: Mutex<Option<ResolvedTarget>>,
}

impl Invocation {
    pub(crate) fn new(
        services: Arc<NodeServices>,
        service_name: String,
        op: Arc<dyn Operation>,
        mode: InvocationMode,
        params: InvocationParams,
    ) -> Arc<Self> {
        let call_timeout_millis = derive_call_timeout(
            op.as_ref(),
            params.call_timeout_millis,
            services.config.default_call_timeout_millis,
        );
        let future = Arc::new(InvocationFuture::new(call_timeout_millis));
        if let Some(callback) = params.callback {
            future.on_complete(callback);
        }

        Arc::new_cyclic(|self_ref| Self {
            services,
            service_name,
            op,
            mode,
            try_count: params.try_count,
            try_pause_millis: params.try_pause_millis,
            call_timeout_millis,
            result_deserialized: params.result_deserialized,
            future,
            policy: params.policy,
            self_ref: self_ref.clone(),

            invoke_count: AtomicU32::new(0),
            response_received: AtomicBool::new(false),
            remote: AtomicBool::new(false),
            backups_expected: AtomicU32::new(0),
            backups_completed: AtomicU32::new(0),
            pending_response: ArcSwapOption::const_empty(),
            pending_response_received_millis: AtomicI64::new(-1),
            target: Mutex::new(None),
        })
    }

    /// Dispatch the operation and return the future.
    ///
    /// The first attempt runs on the calling thread; retries re-enter from
    /// the engine's retry executors.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the invocation was already invoked, the
    /// operation is bound to another invocation, or the calling thread may
    /// not make a blocking invocation. Everything observed after dispatch
    /// surfaces through the future instead.
    pub fn invoke(self: &Arc<Self>) -> Result<Arc<InvocationFuture>> {
        self.invoke_internal(false)?;
        Ok(Arc::clone(&self.future))
    }

    /// Dispatch the operation without handing out the future.
    ///
    /// Completion is observed through the callback installed at build time.
    ///
    /// # Errors
    ///
    /// Same synchronous failures as [`Invocation::invoke`].
    pub fn invoke_async(self: &Arc<Self>) -> Result<()> {
        self.invoke_internal(true)
    }

    fn invoke_internal(self: &Arc<Self>, is_async: bool) -> Result<()> {
        if self.invoke_count.load(Ordering::Acquire) > 0 {
            return Err(FerriteError::AlreadyInvoked {
                invocation: self.to_string(),
            });
        }
        let state = self.op.state();
        if state.call_id().is_set() {
            return Err(FerriteError::OperationReused {
                operation: self.op.name().to_string(),
                call_id: state.call_id().as_u64(),
            });
        }

        state.set_call_timeout_millis(self.call_timeout_millis);
        state.set_caller_address(self.services.node.this_address().clone());
        state.set_service_name(self.service_name.clone());
        if let InvocationMode::Partitioned {
            partition_id,
            replica_index,
        } = &self.mode
        {
            state.set_partition_id(*partition_id);
            state.set_replica_index(*replica_index);
        }

        let allowed = self
            .services
            .op_executor
            .is_invocation_allowed(self.op.as_ref(), is_async);
        if !allowed && !self.op.is_migration() {
            return Err(FerriteError::ThreadNotAllowed {
                thread: std::thread::current()
                    .name()
                    .unwrap_or("unnamed")
                    .to_string(),
                operation: self.op.name().to_string(),
            });
        }

        self.do_invoke();
        Ok(())
    }

    /// Re-entry point for the retry executors.
    pub fn run(self: &Arc<Self>) {
        self.do_invoke();
    }

    fn do_invoke(self: &Arc<Self>) {
        if !self.engine_active() {
            return;
        }

        self.invoke_count.fetch_add(1, Ordering::AcqRel);

        if !self.init_invocation_target() {
            return;
        }

        self.op
            .state()
            .set_invocation_time_millis(self.services.cluster.cluster_time_millis());
        let call_id = self.services.registry.register(self);
        debug!(call_id = %call_id, invocation = %self, "dispatching");

        if self.remote.load(Ordering::Acquire) {
            self.do_invoke_remote();
        } else {
            self.do_invoke_local();
        }
    }

    fn engine_active(&self) -> bool {
        if self.services.node.is_active() {
            return true;
        }
        self.remote.store(false, Ordering::Release);
        self.notify_error(FerriteError::InstanceNotActive);
        false
    }

    /// Resolve and validate the destination of this attempt.
    ///
    /// Every failure short-circuits through `notify_error` and returns
    /// `false`, so the caller just stops.
    fn init_invocation_target(&self) -> bool {
        let this_address = self.services.node.this_address().clone();

        let Some(target) = self.resolve_target() else {
            self.remote.store(false, Ordering::Release);
            if self.services.node.is_active() {
                self.notify_error(FerriteError::WrongTarget {
                    this_address,
                    target: None,
                    partition_id: self.mode.partition_id_i64(),
                    replica_index: self.mode.replica_index_i64(),
                    operation: self.op.name().to_string(),
                    service: self.service_name.clone(),
                });
            } else {
                self.notify_error(FerriteError::InstanceNotActive);
            }
            return false;
        };

        let member = self.services.cluster.member(&target);
        if member.is_none() && !self.op.is_join() {
            self.notify_error(FerriteError::TargetNotMember {
                target,
                partition_id: self.mode.partition_id_i64(),
                operation: self.op.name().to_string(),
                service: self.service_name.clone(),
            });
            return false;
        }

        let op_partition = self
            .op
            .state()
            .partition_id()
            .map_or(-1, |p| i64::from(p.as_u32()));
        if op_partition != self.mode.partition_id_i64() {
            self.notify_error(FerriteError::PartitionMismatch {
                operation_partition: op_partition,
                invocation_partition: self.mode.partition_id_i64(),
            });
            return false;
        }

        let op_replica = i64::from(self.op.state().replica_index().as_u8());
        if op_replica != self.mode.replica_index_i64() {
            self.notify_error(FerriteError::ReplicaMismatch {
                operation_replica: op_replica,
                invocation_replica: self.mode.replica_index_i64(),
            });
            return false;
        }

        let remote = target != this_address;
        *self.target.lock() = Some(ResolvedTarget {
            address: target,
            member,
        });
        self.remote.store(remote, Ordering::Release);
        true
    }

    fn resolve_target(&self) -> Option<Address> {
        match &self.mode {
            InvocationMode::Partitioned {
                partition_id,
                replica_index,
            } => self
                .services
                .partitions
                .replica_address(*partition_id, *replica_index),
            InvocationMode::Targeted { address } => Some(address.clone()),
        }
    }

    fn do_invoke_local(self: &Arc<Self>) {
        let state = self.op.state();
        if state.caller_uuid().is_none() {
            state.set_caller_uuid(self.services.node.uuid());
        }

        self.response_received.store(false, Ordering::Release);
        let handler: Weak<dyn ResponseHandler> = self.self_ref.clone();
        state.set_response_handler(handler);

        self.services
            .op_executor
            .run_on_calling_thread_if_possible(Arc::clone(&self.op));
    }

    fn do_invoke_remote(self: &Arc<Self>) {
        let Some(target) = self.target.lock().as_ref().map(|t| t.address.clone()) else {
            // unreachable: the target is resolved before dispatch
            return;
        };
        if !self.services.transport.send(&self.op, &target) {
            self.services.registry.deregister(self);
            self.notify_error(FerriteError::RetryableIo {
                cause: format!("packet not sent to {}", target),
            });
        }
    }

    /// The operation being invoked.
    #[must_use]
    pub fn op(&self) -> &Arc<dyn Operation> {
        &self.op
    }

    /// The future tracking this invocation's completion.
    #[must_use]
    pub fn future(&self) -> &Arc<InvocationFuture> {
        &self.future
    }

    /// How this invocation routes to its destination.
    #[must_use]
    pub fn mode(&self) -> &InvocationMode {
        &self.mode
    }

    /// The service that owns the operation.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Number of dispatch attempts so far.
    #[must_use]
    pub fn invoke_count(&self) -> u32 {
        self.invoke_count.load(Ordering::Acquire)
    }

    /// The derived call timeout in milliseconds.
    #[must_use]
    pub fn call_timeout_millis(&self) -> u64 {
        self.call_timeout_millis
    }

    /// Whether the current attempt went to a remote member.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.remote.load(Ordering::Acquire)
    }

    /// Destination of the current attempt, once resolved.
    #[must_use]
    pub fn target_address(&self) -> Option<Address> {
        self.target.lock().as_ref().map(|t| t.address.clone())
    }

    /// Membership record of the target, captured at resolution time.
    #[must_use]
    pub fn target_member(&self) -> Option<Member> {
        self.target.lock().as_ref().and_then(|t| t.member.clone())
    }

    /// Backup acknowledgements expected by the current attempt.
    #[must_use]
    pub fn backups_expected(&self) -> u32 {
        self.backups_expected.load(Ordering::Acquire)
    }

    /// Backup acknowledgements received by the current attempt.
    #[must_use]
    pub fn backups_completed(&self) -> u32 {
        self.backups_completed.load(Ordering::Acquire)
    }
}

impl ResponseHandler for Invocation {
    /// Response-handler callback used for local executions.
    ///
    /// Guards the single false→true transition of the per-attempt
    /// response-received flag, then feeds the envelope to `notify`.
    fn send_response(&self, response: Response) -> Result<()> {
        if self
            .response_received
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FerriteError::ResponseAlreadySent {
                invocation: self.to_string(),
            });
        }
        self.notify(response);
        Ok(())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invocation{{service='{}', op={}, mode={:?}, tryCount={}, tryPauseMillis={}, \
             invokeCount={}, callTimeoutMillis={}, target={:?}, backupsExpected={}, \
             backupsCompleted={}}}",
            self.service_name,
            self.op.name(),
            self.mode,
            self.try_count,
            self.try_pause_millis,
            self.invoke_count(),
            self.call_timeout_millis,
            self.target.lock().as_ref().map(|t| t.address.clone()),
            self.backups_expected(),
            self.backups_completed(),
        )
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Derive the effective call timeout.
///
/// A positive caller-supplied timeout wins. Otherwise a wait-aware
/// operation with a finite positive wait timeout gets
/// `min(max(wait, MIN_TIMEOUT), default)`, and everything else gets the
/// engine default.
fn derive_call_timeout(op: &dyn Operation, requested_millis: u64, default_millis: u64) -> u64 {
    if requested_millis > 0 {
        return requested_millis;
    }
    if let Some(wait_support) = op.wait_support() {
        let wait = wait_support.wait_timeout_millis();
        if wait > 0 && wait < i64::MAX {
            return (wait as u64).max(MIN_TIMEOUT_MILLIS).min(default_millis);
        }
    }
    default_millis
}
