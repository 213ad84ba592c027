//! Exception policy: what one failed attempt means for the invocation.

use ferrite_core::{FerriteError, Operation};

/// Decision taken for a failure observed by an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionAction {
    /// Dispatch another attempt, budget permitting.
    Retry,
    /// The operation is parked on the target; keep the future open.
    ContinueWait,
    /// The failure is terminal; it becomes the invocation's result.
    Throw,
}

/// Policy override installed per invocation.
///
/// Operation families that need a refined policy (partition-bound vs
/// target-bound, join flows) install a closure instead of subclassing.
pub type ExceptionPolicy = dyn Fn(&FerriteError) -> ExceptionAction + Send + Sync;

/// The default policy.
///
/// Wait-aware operations keep waiting when the target says so; transient
/// transport and routing faults are retried; everything else is terminal.
/// The attempt budget is enforced by the caller, not here.
pub(crate) fn default_action(op: &dyn Operation, error: &FerriteError) -> ExceptionAction {
    if error.keeps_waiting() && op.wait_support().is_some() {
        return ExceptionAction::ContinueWait;
    }
    if error.is_retriable() {
        return ExceptionAction::Retry;
    }
    ExceptionAction::Throw
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_core::{OperationState, Result, WaitSupport};

    #[derive(Debug)]
    struct PlainOp(OperationState);

    impl Operation for PlainOp {
        fn state(&self) -> &OperationState {
            &self.0
        }
        fn name(&self) -> &str {
            "plain"
        }
        fn execute(&self) -> Result<Option<bytes::Bytes>> {
            Ok(None)
        }
    }

    #[derive(Debug)]
    struct WaitingOp(OperationState);

    impl Operation for WaitingOp {
        fn state(&self) -> &OperationState {
            &self.0
        }
        fn name(&self) -> &str {
            "waiting"
        }
        fn execute(&self) -> Result<Option<bytes::Bytes>> {
            Ok(None)
        }
        fn wait_support(&self) -> Option<&dyn WaitSupport> {
            Some(self)
        }
    }

    impl WaitSupport for WaitingOp {
        fn wait_timeout_millis(&self) -> i64 {
            self.0.wait_timeout_millis()
        }
        fn set_wait_timeout_millis(&self, millis: i64) {
            self.0.set_wait_timeout_millis(millis);
        }
    }

    #[test]
    fn retriable_faults_retry() {
        let op = PlainOp(OperationState::new());
        let err = FerriteError::RetryableIo {
            cause: "refused".to_string(),
        };
        assert_eq!(default_action(&op, &err), ExceptionAction::Retry);
    }

    #[test]
    fn fatal_faults_throw() {
        let op = PlainOp(OperationState::new());
        assert_eq!(
            default_action(&op, &FerriteError::InstanceNotActive),
            ExceptionAction::Throw
        );
    }

    #[test]
    fn keep_alive_requires_wait_support() {
        let err = FerriteError::WaitKeepAlive {
            service: "lock".to_string(),
        };

        let plain = PlainOp(OperationState::new());
        assert_eq!(default_action(&plain, &err), ExceptionAction::Throw);

        let waiting = WaitingOp(OperationState::new());
        assert_eq!(default_action(&waiting, &err), ExceptionAction::ContinueWait);
    }
}
