//! Timeouts, the retry budget, the fast-retry window, wait-notify
//! accounting, and the durability repair on silent target death.

mod common;

use bytes::Bytes;
use common::{test_node, wait_until, MockOperation, REMOTE_PARTITION};
use ferrite_core::{FerriteError, Operation, Response, ResponseValue};
use ferrite_engine::EngineConfig;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn retryable() -> Response {
    Response::error(FerriteError::RetryableIo {
        cause: "connection reset".to_string(),
    })
}

#[test]
fn remote_retries_until_success() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));

    let invocation = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_try_count(3)
        .with_try_pause_millis(10)
        .build();
    let future = invocation.invoke().unwrap();

    node.service.notify_response(node.last_call_id(), retryable());
    assert!(node.transport.wait_for_sends(2, Duration::from_secs(5)));

    node.service.notify_response(node.last_call_id(), retryable());
    assert!(node.transport.wait_for_sends(3, Duration::from_secs(5)));

    node.service.notify_response(
        node.last_call_id(),
        Response::normal(ResponseValue::Data(Bytes::from_static(b"ok")), 0),
    );

    assert_eq!(
        future.get(Duration::from_secs(5)).unwrap(),
        ResponseValue::Data(Bytes::from_static(b"ok"))
    );
    assert_eq!(invocation.invoke_count(), 3);
}

#[test]
fn retry_budget_exhausts_with_the_failure() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));

    let invocation = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_try_count(3)
        .with_try_pause_millis(10)
        .build();
    let future = invocation.invoke().unwrap();

    for sends in 1..=3usize {
        assert!(node.transport.wait_for_sends(sends, Duration::from_secs(5)));
        node.service.notify_response(node.last_call_id(), retryable());
    }

    let result = future.get(Duration::from_secs(5));
    assert!(matches!(result, Err(FerriteError::RetryableIo { .. })));
    assert_eq!(invocation.invoke_count(), 3);
    assert_eq!(node.transport.sent_count(), 3);
}

#[test]
fn transport_refusal_is_a_retryable_failure() {
    let node = test_node(EngineConfig::default());
    node.transport.set_accept(false);
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));

    let future = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_try_count(2)
        .with_try_pause_millis(10)
        .invoke()
        .unwrap();

    let result = future.get(Duration::from_secs(5));
    assert!(matches!(result, Err(FerriteError::RetryableIo { .. })));
    assert!(wait_until(
        || node.service.registry().size() == 0,
        Duration::from_secs(2),
    ));
}

#[test]
fn fast_retries_skip_the_pause() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));
    let pause_millis = 300u64;

    let invocation = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_try_count(10)
        .with_try_pause_millis(pause_millis)
        .build();
    let future = invocation.invoke().unwrap();

    // drive six attempts: retries 1-4 are fast, retry 5 waits the pause
    for sends in 1..=5usize {
        assert!(node.transport.wait_for_sends(sends, Duration::from_secs(5)));
        node.service.notify_response(node.last_call_id(), retryable());
    }
    assert!(node.transport.wait_for_sends(6, Duration::from_secs(5)));

    let packets = node.transport.sent();
    for fast in 0..4 {
        let gap = packets[fast + 1].at - packets[fast].at;
        assert!(
            gap < Duration::from_millis(250),
            "retry {} should be fast, took {:?}",
            fast + 1,
            gap
        );
    }
    let slow_gap = packets[5].at - packets[4].at;
    assert!(
        slow_gap >= Duration::from_millis(280),
        "retry 5 should wait the pause, took {:?}",
        slow_gap
    );

    node.service.notify_response(
        node.last_call_id(),
        Response::normal(ResponseValue::Null, 0),
    );
    future.get(Duration::from_secs(5)).unwrap();
}

#[test]
fn interrupted_invocation_completes_on_next_retry() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));

    let future = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_try_count(5)
        .invoke()
        .unwrap();

    future.interrupt();
    node.service.notify_response(node.last_call_id(), retryable());

    assert_eq!(
        future.get(Duration::from_secs(5)),
        Err(FerriteError::Interrupted)
    );
}

#[test]
fn call_timeout_expires_unanswered_invocation() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.get", b"unused"));

    let invocation = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_call_timeout_millis(100)
        .build();
    let future = invocation.invoke().unwrap();

    thread::sleep(Duration::from_millis(150));
    invocation.notify_invocation_timeout();

    match future.get(Duration::from_secs(5)) {
        Err(FerriteError::OperationTimeout { message }) => {
            assert!(message.contains("backups-expected"));
            assert!(message.contains("No response has been received"));
        }
        other => panic!("expected an operation timeout, got {:?}", other),
    }
}

#[test]
fn monitor_drives_call_timeout() {
    let node = test_node(EngineConfig::default().with_scan_interval_millis(25));
    let op = Arc::new(MockOperation::returning("map.get", b"unused"));

    let future = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_call_timeout_millis(100)
        .invoke()
        .unwrap();

    // poll without blocking: a blocked waiter would suppress the monitor
    assert!(wait_until(|| future.is_done(), Duration::from_secs(5)));
    assert!(matches!(
        future.peek().unwrap(),
        Err(FerriteError::OperationTimeout { .. })
    ));
}

#[test]
fn blocked_waiter_suppresses_monitor_timeout() {
    let node = test_node(EngineConfig::default().with_scan_interval_millis(25));
    let op = Arc::new(MockOperation::returning("map.get", b"unused"));

    let future = node
        .service
        .invoke_on_partition("map", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_call_timeout_millis(100)
        .invoke()
        .unwrap();

    // the waiter outlives the call timeout; the monitor must leave the
    // invocation to the waiter's own deadline
    let result = future.get(Duration::from_millis(400));
    assert_eq!(
        result,
        Err(FerriteError::FutureTimeout {
            waited_millis: 400
        })
    );
}

#[test]
fn wait_notify_timeout_debits_wait_budget() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("lock.acquire", b"unused").wait_aware(500));

    let invocation = node
        .service
        .invoke_on_partition("lock", op.clone() as Arc<dyn Operation>, REMOTE_PARTITION)
        .with_call_timeout_millis(100)
        .build();
    let _future = invocation.invoke().unwrap();
    assert_eq!(invocation.invoke_count(), 1);

    node.service
        .notify_response(node.last_call_id(), Response::call_timeout());

    // the retry re-dispatches without consuming an attempt slot
    assert!(node.transport.wait_for_sends(2, Duration::from_secs(5)));
    assert_eq!(invocation.invoke_count(), 1);
    assert_eq!(op.state().wait_timeout_millis(), 400);
}

#[test]
fn keep_alive_leaves_the_future_open_without_a_retry() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("lock.acquire", b"unused").wait_aware(-1));

    let invocation = node
        .service
        .invoke_on_partition("lock", op as Arc<dyn Operation>, REMOTE_PARTITION)
        .build();
    let future = invocation.invoke().unwrap();

    node.service.notify_response(
        node.last_call_id(),
        Response::error(FerriteError::WaitKeepAlive {
            service: "lock".to_string(),
        }),
    );

    // the operation stays parked on the target: no completion, no redispatch
    thread::sleep(Duration::from_millis(50));
    assert!(!future.is_done());
    assert_eq!(node.transport.sent_count(), 1);
    assert_eq!(invocation.invoke_count(), 1);

    // the real response arrives later
    node.service.notify_response(
        node.last_call_id(),
        Response::normal(ResponseValue::Data(Bytes::from_static(b"granted")), 0),
    );
    assert_eq!(
        future.get(Duration::from_secs(5)).unwrap(),
        ResponseValue::Data(Bytes::from_static(b"granted"))
    );
}

#[test]
fn overdue_backups_release_pending_response_when_target_lives() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"unused"));

    let invocation = node
        .service
        .invoke_on_partition("map", op.clone() as Arc<dyn Operation>, REMOTE_PARTITION)
        .build();
    let future = invocation.invoke().unwrap();

    node.service.notify_response(
        node.last_call_id(),
        Response::normal(ResponseValue::Data(Bytes::from_static(b"v1")), 1),
    );
    assert!(!future.is_done());

    thread::sleep(Duration::from_millis(30));
    invocation.check_backup_timeout(10);

    assert_eq!(
        future.get(Duration::from_secs(5)).unwrap(),
        ResponseValue::Data(Bytes::from_static(b"v1"))
    );
    assert_eq!(op.executions(), 0, "no local re-execution happened");
}

#[test]
fn dead_target_during_backup_window_reinvokes() {
    let node = test_node(EngineConfig::default());
    let op = Arc::new(MockOperation::returning("map.put", b"v2"));

    let invocation = node
        .service
        .invoke_on_partition("map", op.clone() as Arc<dyn Operation>, REMOTE_PARTITION)
        .build();
    let future = invocation.invoke().unwrap();

    // primary responds but one backup never acks
    node.service.notify_response(
        node.last_call_id(),
        Response::normal(ResponseValue::Data(Bytes::from_static(b"v1")), 1),
    );
    assert!(!future.is_done());
    assert_eq!(invocation.target_member().map(|m| m.address), Some(node.peer.address.clone()));

    // the target dies; the partition fails over to the local member
    node.cluster.remove_member(&node.peer.address);
    node.partitions
        .set_owner(REMOTE_PARTITION, node.local.address.clone())
        .unwrap();

    thread::sleep(Duration::from_millis(30));
    invocation.check_backup_timeout(10);

    // completing with "v1" would surface a write nobody stores; instead the
    // operation ran again on the new owner
    assert_eq!(
        future.get(Duration::from_secs(5)).unwrap(),
        ResponseValue::Data(Bytes::from_static(b"v2"))
    );
    assert_eq!(op.executions(), 1);
    assert_eq!(invocation.invoke_count(), 1, "attempt counter was reset");
    assert_eq!(invocation.backups_expected(), 0);
}
