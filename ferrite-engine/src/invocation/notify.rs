//! Response classification and completion paths.
//!
//! Every signal an invocation can receive funnels through [`Invocation::notify`]
//! or one of the monitor entry points below. The subtle part is the race
//! between the primary response and backup acknowledgements: whichever
//! arrives last completes the future, and publication order of the
//! expected-backup count versus the pending response decides who may win.

use super::policy::default_action;
use super::{
    ExceptionAction, Invocation, LOG_INVOCATION_COUNT_MOD, LOG_MAX_INVOCATION_COUNT,
    MAX_FAST_INVOCATION_COUNT,
};
use ferrite_core::{FerriteError, InvocationResult, Response, ResponseValue};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

fn wall_clock_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl Invocation {
    /// Handle a signal for this invocation.
    ///
    /// Safe to call from any thread; duplicate terminal signals lose the
    /// race on the future and become no-ops.
    pub fn notify(&self, response: Response) {
        match response {
            Response::CallTimeout(_) => self.notify_call_timeout_response(),
            Response::Error(error) => self.notify_error_response(error.cause),
            Response::Normal(normal) => {
                self.notify_normal_response(normal.value, u32::from(normal.backup_count));
            }
            Response::BackupAck(_) => self.notify_one_backup_complete(),
        }
    }

    /// Handle a failure raised outside a response envelope.
    pub fn notify_error(&self, error: FerriteError) {
        self.notify_error_response(error);
    }

    fn notify_error_response(&self, error: FerriteError) {
        let action = self.exception_action(&error);
        let invoke_count = self.invoke_count.load(Ordering::Acquire);

        if action == ExceptionAction::Retry && invoke_count < self.try_count {
            if invoke_count > LOG_MAX_INVOCATION_COUNT
                && invoke_count % LOG_INVOCATION_COUNT_MOD == 0
            {
                warn!(invocation = %self, error = %error, "retrying invocation");
            }
            self.handle_retry_response();
            return;
        }

        if action == ExceptionAction::ContinueWait {
            self.future.mark_waiting();
            return;
        }

        self.complete(Err(error));
    }

    /// Handle the primary's regular response.
    ///
    /// When backups are still outstanding the response is parked: the
    /// receive time and the expected count are published *before* the
    /// pending response, so a backup completer that observes the pending
    /// response is guaranteed to read the real expected count. The reverse
    /// order would let it complete the future against a count of zero.
    fn notify_normal_response(&self, value: ResponseValue, expected_backups: u32) {
        if expected_backups > self.backups_completed.load(Ordering::Acquire) {
            self.pending_response_received_millis
                .store(wall_clock_millis(), Ordering::Relaxed);
            self.backups_expected
                .store(expected_backups, Ordering::Release);
            self.pending_response.store(Some(Arc::new(value.clone())));

            if self.backups_completed.load(Ordering::Acquire) != expected_backups {
                // Not all backups are in; the last acknowledgement or the
                // backup-timeout sweep releases the future.
                return;
            }
        }

        self.complete(Ok(value));
    }

    /// Record one backup acknowledgement from the replication layer.
    ///
    /// Exactly one caller observes its increment meeting the expected
    /// count with the pending response published, and that caller
    /// completes the future.
    pub fn notify_one_backup_complete(&self) {
        let completed = self.backups_completed.fetch_add(1, Ordering::AcqRel) + 1;

        let Some(pending) = self.pending_response.load_full() else {
            // The primary has not replied yet; it completes or parks first.
            return;
        };

        let expected = self.backups_expected.load(Ordering::Acquire);
        if expected > completed {
            return;
        }
        if expected < completed {
            // Acknowledgements of an attempt aborted by reset_and_reinvoke
            // can overrun the fresh counters.
            trace!(
                invocation = %self,
                expected = expected,
                completed = completed,
                "backup acknowledgement overran expectation"
            );
            return;
        }

        self.complete(Ok((*pending).clone()));
    }

    /// Handle a wait-queue call timeout: the call window elapsed while the
    /// operation was parked. Debits the wait budget by the call timeout and
    /// retries without consuming an attempt slot.
    fn notify_call_timeout_response(&self) {
        trace!(invocation = %self, "call timed out during wait-notify phase, retrying");

        if let Some(wait_support) = self.op.wait_support() {
            let debit = i64::try_from(self.call_timeout_millis).unwrap_or(i64::MAX);
            let wait = wait_support.wait_timeout_millis();
            wait_support.set_wait_timeout_millis(wait.saturating_sub(debit));
        }
        self.invoke_count.fetch_sub(1, Ordering::AcqRel);
        self.handle_retry_response();
    }

    fn handle_retry_response(&self) {
        if self.future.interrupted() {
            self.complete(Err(FerriteError::Interrupted));
            return;
        }

        self.future.mark_waiting();
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        if self.invoke_count.load(Ordering::Acquire) < MAX_FAST_INVOCATION_COUNT {
            self.services.retry_pool.execute(Box::new(move || this.run()));
        } else {
            let pause = Duration::from_millis(self.try_pause_millis);
            self.services
                .retry_scheduler
                .schedule(pause, Box::new(move || this.run()));
        }
    }

    /// Monitor entry point: expire an invocation whose call window elapsed
    /// with no response at all.
    pub fn notify_invocation_timeout(&self) {
        if self.pending_response.load().is_some() {
            // The primary replied; the backup sweep owns this invocation now.
            return;
        }

        if self.future.waiting_threads() > 0 {
            // Blocked waiters detect their own deadline.
            return;
        }

        let max_call_timeout = self.future.max_call_timeout_millis();
        if max_call_timeout == u64::MAX {
            return;
        }

        let invocation_time = self.op.state().invocation_time_millis();
        let Ok(timeout) = i64::try_from(max_call_timeout) else {
            return;
        };
        let Some(expiration) = invocation_time.checked_add(timeout) else {
            // impossible to expire
            return;
        };

        if expiration < self.services.cluster.cluster_time_millis() {
            self.complete(Err(FerriteError::OperationTimeout {
                message: self.timeout_message(max_call_timeout),
            }));
        }
    }

    fn timeout_message(&self, total_timeout_millis: u64) -> String {
        let has_response = self.pending_response.load().is_some();
        let detail = if has_response {
            "Not all backups have completed!"
        } else {
            "No response has been received!"
        };
        format!(
            "No response for {} ms. Aborting invocation! {} {} backups-expected: {} backups-completed: {}",
            total_timeout_millis,
            self,
            detail,
            self.backups_expected(),
            self.backups_completed(),
        )
    }

    /// Monitor entry point: deal with an invocation whose primary replied
    /// but whose backups are overdue.
    ///
    /// A live-but-slow target releases the future with the pending primary
    /// value; progress wins over backup strictness past this horizon. A
    /// dead target triggers a full re-invocation instead: completing the
    /// future would surface a write no surviving replica stores.
    pub fn check_backup_timeout(&self, timeout_millis: u64) {
        // Equal counts also filters every operation without backups.
        let expected = self.backups_expected.load(Ordering::Acquire);
        let completed = self.backups_completed.load(Ordering::Acquire);
        if expected == completed {
            return;
        }

        let received_millis = self.pending_response_received_millis.load(Ordering::Relaxed);
        if received_millis == -1 {
            // The primary never replied; the call-timeout path owns this.
            return;
        }

        let budget = i64::try_from(timeout_millis).unwrap_or(i64::MAX);
        let expiration = received_millis.saturating_add(budget);
        if expiration >= wall_clock_millis() {
            return;
        }

        let target_dead = {
            let target = self.target.lock();
            match target.as_ref() {
                Some(resolved) => self.services.cluster.member(&resolved.address).is_none(),
                None => false,
            }
        };
        if target_dead {
            debug!(invocation = %self, "target left before completing backups, re-invoking");
            self.reset_and_reinvoke();
            return;
        }

        if let Some(pending) = self.pending_response.load_full() {
            self.complete(Ok((*pending).clone()));
        }
    }

    /// Clear all per-attempt state and drive a fresh dispatch.
    fn reset_and_reinvoke(&self) {
        self.invoke_count.store(0, Ordering::Release);
        self.pending_response.store(None);
        self.pending_response_received_millis
            .store(-1, Ordering::Relaxed);
        self.backups_expected.store(0, Ordering::Release);
        self.backups_completed.store(0, Ordering::Release);

        if let Some(this) = self.self_ref.upgrade() {
            this.do_invoke();
        }
    }

    /// The single completion path: deserializes the value when asked to,
    /// sets the future idempotently, and drops the registry entry on the
    /// first completion.
    fn complete(&self, result: InvocationResult) {
        let result = match result {
            Ok(ResponseValue::Data(bytes)) if self.result_deserialized => {
                match serde_json::from_slice::<serde_json::Value>(&bytes) {
                    Ok(value) => Ok(ResponseValue::Json(value)),
                    Err(error) => Err(FerriteError::Serialization {
                        cause: error.to_string(),
                    }),
                }
            }
            other => other,
        };

        if self.future.complete(result) {
            self.services.registry.deregister(self);
        }
    }

    fn exception_action(&self, error: &FerriteError) -> ExceptionAction {
        match &self.policy {
            Some(policy) => (policy.as_ref())(error),
            None => default_action(self.op.as_ref(), error),
        }
    }
}
