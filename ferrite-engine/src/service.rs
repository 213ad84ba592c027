//! The operation service façade.
//!
//! `OperationService` wires the engine together: it owns the invocation
//! registry, the retry executors, and the monitor, and exposes the two
//! ways to start an invocation plus the inbound path that routes response
//! envelopes back to their invocations by call id.

use crate::config::EngineConfig;
use crate::executor::{DelayedExecutor, TaskPool};
use crate::future::{CompletionCallback, InvocationFuture};
use crate::invocation::{ExceptionPolicy, Invocation, InvocationMode, InvocationParams};
use crate::monitor::InvocationMonitor;
use crate::registry::InvocationRegistry;
use ferrite_core::{
    Address, CallId, ClusterView, LocalNode, Operation, OperationExecutor, PartitionId,
    PartitionView, ReplicaIndex, Response, Result, Transport,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable bundle of collaborators handed to every invocation.
///
/// There are no process-wide singletons; everything an invocation touches
/// comes through this handle.
pub struct NodeServices {
    pub(crate) config: EngineConfig,
    pub(crate) node: Arc<LocalNode>,
    pub(crate) cluster: Arc<dyn ClusterView>,
    pub(crate) partitions: Arc<dyn PartitionView>,
    pub(crate) op_executor: Arc<dyn OperationExecutor>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) registry: Arc<InvocationRegistry>,
    pub(crate) retry_pool: Arc<TaskPool>,
    pub(crate) retry_scheduler: Arc<DelayedExecutor>,
}

impl NodeServices {
    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The local node handle.
    #[must_use]
    pub fn node(&self) -> &Arc<LocalNode> {
        &self.node
    }
}

/// Entry point for dispatching operations.
pub struct OperationService {
    services: Arc<NodeServices>,
    monitor: InvocationMonitor,
}

impl OperationService {
    /// Assemble the engine from its collaborators and start the monitor.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        node: Arc<LocalNode>,
        cluster: Arc<dyn ClusterView>,
        partitions: Arc<dyn PartitionView>,
        op_executor: Arc<dyn OperationExecutor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(InvocationRegistry::new());
        let retry_pool = Arc::new(TaskPool::new("retry", config.retry_thread_count));
        let retry_scheduler = Arc::new(DelayedExecutor::new(
            "retry-scheduler",
            Arc::clone(&retry_pool),
        ));
        let monitor = InvocationMonitor::start(Arc::clone(&registry), &config);

        let services = Arc::new(NodeServices {
            config,
            node,
            cluster,
            partitions,
            op_executor,
            transport,
            registry,
            retry_pool,
            retry_scheduler,
        });

        Self { services, monitor }
    }

    /// Start building an invocation routed to a replica of a partition.
    #[must_use]
    pub fn invoke_on_partition(
        &self,
        service_name: impl Into<String>,
        op: Arc<dyn Operation>,
        partition_id: PartitionId,
    ) -> InvocationBuilder {
        InvocationBuilder::new(
            Arc::clone(&self.services),
            service_name.into(),
            op,
            InvocationMode::Partitioned {
                partition_id,
                replica_index: ReplicaIndex::PRIMARY,
            },
        )
    }

    /// Start building an invocation sent to an explicit member address.
    #[must_use]
    pub fn invoke_on_target(
        &self,
        service_name: impl Into<String>,
        op: Arc<dyn Operation>,
        address: Address,
    ) -> InvocationBuilder {
        InvocationBuilder::new(
            Arc::clone(&self.services),
            service_name.into(),
            op,
            InvocationMode::Targeted { address },
        )
    }

    /// Route an inbound response envelope to its invocation.
    ///
    /// Unmatched call ids are normal for backup acknowledgements (the
    /// invocation may have completed already) and suspicious for anything
    /// else.
    pub fn notify_response(&self, call_id: CallId, response: Response) {
        match self.services.registry.get(call_id) {
            Some(invocation) => invocation.notify(response),
            None => match response {
                Response::BackupAck(_) => {
                    debug!(call_id = %call_id, "backup ack for an already completed invocation");
                }
                other => {
                    warn!(call_id = %call_id, response = ?other, "no invocation registered for response");
                }
            },
        }
    }

    /// Record a backup acknowledgement for a call id.
    pub fn notify_backup_complete(&self, call_id: CallId) {
        self.notify_response(call_id, Response::backup_ack());
    }

    /// The call timeout applied when an invoker does not supply one.
    #[must_use]
    pub fn default_call_timeout_millis(&self) -> u64 {
        self.services.config.default_call_timeout_millis
    }

    /// The invocation registry; exposed for response routing and tests.
    #[must_use]
    pub fn registry(&self) -> &Arc<InvocationRegistry> {
        &self.services.registry
    }

    /// The services handle shared with every invocation.
    #[must_use]
    pub fn services(&self) -> &Arc<NodeServices> {
        &self.services
    }

    /// Stop the engine: the node goes inactive, the monitor and the retry
    /// executors stop. In-flight invocations fail with
    /// `InstanceNotActive` on their next transition.
    pub fn shutdown(&self) {
        self.services.node.set_active(false);
        self.monitor.shutdown();
        self.services.retry_scheduler.shutdown();
        self.services.retry_pool.shutdown();
    }
}

impl Drop for OperationService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder collecting per-invocation knobs before dispatch.
pub struct InvocationBuilder {
    services: Arc<NodeServices>,
    service_name: String,
    op: Arc<dyn Operation>,
    mode: InvocationMode,
    try_count: u32,
    try_pause_millis: u64,
    call_timeout_millis: u64,
    result_deserialized: bool,
    callback: Option<CompletionCallback>,
    policy: Option<Arc<ExceptionPolicy>>,
}

impl InvocationBuilder {
    fn new(
        services: Arc<NodeServices>,
        service_name: String,
        op: Arc<dyn Operation>,
        mode: InvocationMode,
    ) -> Self {
        let try_count = services.config.default_try_count;
        let try_pause_millis = services.config.default_try_pause_millis;
        Self {
            services,
            service_name,
            op,
            mode,
            try_count,
            try_pause_millis,
            call_timeout_millis: 0,
            result_deserialized: false,
            callback: None,
            policy: None,
        }
    }

    /// Set the number of attempts before a retriable failure is terminal.
    #[must_use]
    pub fn with_try_count(mut self, try_count: u32) -> Self {
        self.try_count = try_count;
        self
    }

    /// Set the pause between slow retries.
    #[must_use]
    pub fn with_try_pause_millis(mut self, millis: u64) -> Self {
        self.try_pause_millis = millis;
        self
    }

    /// Set an explicit call timeout instead of deriving one.
    #[must_use]
    pub fn with_call_timeout_millis(mut self, millis: u64) -> Self {
        self.call_timeout_millis = millis;
        self
    }

    /// Address a non-primary replica (partition-routed invocations only).
    #[must_use]
    pub fn with_replica_index(mut self, replica_index: ReplicaIndex) -> Self {
        if let InvocationMode::Partitioned {
            replica_index: slot,
            ..
        } = &mut self.mode
        {
            *slot = replica_index;
        }
        self
    }

    /// Deserialize the result payload before completing the future.
    #[must_use]
    pub fn deserialize_result(mut self, deserialize: bool) -> Self {
        self.result_deserialized = deserialize;
        self
    }

    /// Install a completion callback.
    #[must_use]
    pub fn on_complete(mut self, callback: CompletionCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Refine the exception policy for this invocation.
    #[must_use]
    pub fn with_exception_policy(mut self, policy: Arc<ExceptionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Build the invocation without dispatching it.
    #[must_use]
    pub fn build(self) -> Arc<Invocation> {
        Invocation::new(
            self.services,
            self.service_name,
            self.op,
            self.mode,
            InvocationParams {
                try_count: self.try_count,
                try_pause_millis: self.try_pause_millis,
                call_timeout_millis: self.call_timeout_millis,
                result_deserialized: self.result_deserialized,
                callback: self.callback,
                policy: self.policy,
            },
        )
    }

    /// Build and dispatch, returning the future.
    ///
    /// # Errors
    ///
    /// Propagates the synchronous failures of [`Invocation::invoke`].
    pub fn invoke(self) -> Result<Arc<InvocationFuture>> {
        self.build().invoke()
    }

    /// Build and dispatch without handing out the future.
    ///
    /// # Errors
    ///
    /// Propagates the synchronous failures of [`Invocation::invoke_async`].
    pub fn invoke_async(self) -> Result<()> {
        self.build().invoke_async()
    }
}
