//! Shared fixtures for the engine integration tests: a scriptable mock
//! operation, a recording transport, and a two-member cluster wiring with
//! one local and one remote partition.

#![allow(dead_code)]

use bytes::Bytes;
use ferrite_cluster::{ClusterClock, ClusterConfig, ClusterRegistry, PartitionTable};
use ferrite_core::{
    Address, BackupAware, CallId, ClusterView, FerriteError, LocalNode, Member, MemberUuid,
    Operation, OperationExecutor, OperationState, PartitionId, PartitionView, Result, Transport,
    WaitSupport,
};
use ferrite_engine::{EngineConfig, OperationService, PartitionExecutor};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Partition owned by the local member in the test wiring.
pub const LOCAL_PARTITION: PartitionId = PartitionId::new(0);
/// Partition owned by the remote member in the test wiring.
pub const REMOTE_PARTITION: PartitionId = PartitionId::new(1);

#[derive(Clone)]
enum MockOutcome {
    Value(Option<Bytes>),
    Fail(FerriteError),
}

/// Scriptable operation for driving the engine in tests.
pub struct MockOperation {
    name: String,
    state: OperationState,
    outcome: Mutex<MockOutcome>,
    executions: AtomicU32,
    sync_backups: Option<u8>,
    wait_aware: bool,
    hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl std::fmt::Debug for MockOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOperation")
            .field("name", &self.name)
            .field("executions", &self.executions())
            .finish()
    }
}

impl MockOperation {
    /// An operation that returns the given payload.
    pub fn returning(name: &str, payload: &'static [u8]) -> Self {
        Self::build(name, MockOutcome::Value(Some(Bytes::from_static(payload))))
    }

    /// An operation that completes without a value.
    pub fn empty(name: &str) -> Self {
        Self::build(name, MockOutcome::Value(None))
    }

    /// An operation whose local execution fails.
    pub fn failing(name: &str, error: FerriteError) -> Self {
        Self::build(name, MockOutcome::Fail(error))
    }

    fn build(name: &str, outcome: MockOutcome) -> Self {
        Self {
            name: name.to_string(),
            state: OperationState::new(),
            outcome: Mutex::new(outcome),
            executions: AtomicU32::new(0),
            sync_backups: None,
            wait_aware: false,
            hook: Mutex::new(None),
        }
    }

    /// Declare the operation backup-aware with the given sync backup count.
    pub fn with_sync_backups(mut self, backups: u8) -> Self {
        self.sync_backups = Some(backups);
        self
    }

    /// Declare the operation wait-aware with the given wait budget.
    pub fn wait_aware(mut self, wait_timeout_millis: i64) -> Self {
        self.wait_aware = true;
        self.state.set_wait_timeout_millis(wait_timeout_millis);
        self
    }

    /// Run a closure inside the first local execution.
    pub fn with_hook(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.hook.lock() = Some(Box::new(hook));
        self
    }

    /// How many times the operation executed locally.
    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }
}

impl Operation for MockOperation {
    fn state(&self) -> &OperationState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self) -> Result<Option<Bytes>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.hook.lock().take() {
            hook();
        }
        match self.outcome.lock().clone() {
            MockOutcome::Value(payload) => Ok(payload),
            MockOutcome::Fail(error) => Err(error),
        }
    }

    fn wait_support(&self) -> Option<&dyn WaitSupport> {
        self.wait_aware.then_some(self as &dyn WaitSupport)
    }

    fn backup_aware(&self) -> Option<&dyn BackupAware> {
        self.sync_backups.map(|_| self as &dyn BackupAware)
    }
}

impl WaitSupport for MockOperation {
    fn wait_timeout_millis(&self) -> i64 {
        self.state.wait_timeout_millis()
    }
    fn set_wait_timeout_millis(&self, millis: i64) {
        self.state.set_wait_timeout_millis(millis);
    }
}

impl BackupAware for MockOperation {
    fn sync_backup_count(&self) -> u8 {
        self.sync_backups.unwrap_or(0)
    }
}

/// One packet handed to the transport.
#[derive(Clone)]
pub struct SentPacket {
    pub call_id: CallId,
    pub target: Address,
    pub at: Instant,
}

/// Transport that records sends instead of delivering them.
pub struct RecordingTransport {
    packets: Mutex<Vec<SentPacket>>,
    accept: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            packets: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
        })
    }

    /// Make the transport accept or refuse subsequent sends.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.packets.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn last_call_id(&self) -> Option<CallId> {
        self.packets.lock().last().map(|p| p.call_id)
    }

    /// Block until at least `count` packets were sent.
    pub fn wait_for_sends(&self, count: usize, timeout: Duration) -> bool {
        wait_until(|| self.sent_count() >= count, timeout)
    }
}

impl Transport for RecordingTransport {
    fn send(&self, op: &Arc<dyn Operation>, target: &Address) -> bool {
        if !self.accept.load(Ordering::SeqCst) {
            return false;
        }
        self.packets.lock().push(SentPacket {
            call_id: op.state().call_id(),
            target: target.clone(),
            at: Instant::now(),
        });
        true
    }
}

/// Poll a predicate until it holds or the timeout elapses.
pub fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

/// A single-node engine wired against a two-member cluster view.
pub struct TestNode {
    pub service: Arc<OperationService>,
    pub cluster: Arc<ClusterRegistry>,
    pub partitions: Arc<PartitionTable>,
    pub transport: Arc<RecordingTransport>,
    pub node: Arc<LocalNode>,
    pub executor: Arc<PartitionExecutor>,
    pub local: Member,
    pub peer: Member,
}

impl TestNode {
    /// Latest call id handed to the transport.
    pub fn last_call_id(&self) -> CallId {
        self.transport.last_call_id().expect("nothing sent yet")
    }
}

/// Build a test node.
///
/// The local member owns `LOCAL_PARTITION`, the peer owns
/// `REMOTE_PARTITION`; two operation threads map one partition each.
pub fn test_node(config: EngineConfig) -> TestNode {
    let clock = Arc::new(ClusterClock::new());
    let cluster = Arc::new(ClusterRegistry::new(Arc::clone(&clock)));

    let local = Member::new(Address::new("127.0.0.1", 5701), MemberUuid::new());
    let peer = Member::new(Address::new("127.0.0.1", 5702), MemberUuid::new());
    cluster.add_member(local.clone());
    cluster.add_member(peer.clone());

    let partitions = Arc::new(PartitionTable::new(
        &ClusterConfig::default().with_partition_count(16),
    ));
    partitions
        .set_owner(LOCAL_PARTITION, local.address.clone())
        .unwrap();
    partitions
        .set_owner(REMOTE_PARTITION, peer.address.clone())
        .unwrap();

    let node = Arc::new(LocalNode::new(local.address.clone(), local.uuid));
    let executor = Arc::new(PartitionExecutor::new(2));
    let transport = RecordingTransport::new();

    let cluster_view: Arc<dyn ClusterView> = Arc::clone(&cluster) as Arc<dyn ClusterView>;
    let partition_view: Arc<dyn PartitionView> = Arc::clone(&partitions) as Arc<dyn PartitionView>;
    let op_executor: Arc<dyn OperationExecutor> = Arc::clone(&executor) as Arc<dyn OperationExecutor>;
    let transport_view: Arc<dyn Transport> = Arc::clone(&transport) as Arc<dyn Transport>;

    let service = Arc::new(OperationService::new(
        config,
        Arc::clone(&node),
        cluster_view,
        partition_view,
        op_executor,
        transport_view,
    ));

    TestNode {
        service,
        cluster,
        partitions,
        transport,
        node,
        executor,
        local,
        peer,
    }
}
