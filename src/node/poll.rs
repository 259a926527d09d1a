//! Bounded polling of node operations.
//!
//! Polling is a plain loop: at most `max_retries` attempts, separated by
//! `frequency`, with the sleep injected so tests run without real delays.

use std::time::Duration;

use crate::error::NodeError;

use super::{NodeApi, OperationResult, OperationStatus, OperationType};

/// Something that can wait. Production code sleeps the thread.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts. Zero is treated as one.
    pub max_retries: u32,
    pub frequency: Duration,
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(OperationResult),
    Failed(OperationResult),
    Exhausted {
        attempts: u32,
        last_status: Option<OperationStatus>,
        last_error: Option<String>,
    },
}

impl PollOutcome {
    /// `Completed` becomes `Ok`; every other outcome becomes the matching error.
    pub fn into_result(
        self,
        operation: OperationType,
        operation_id: &str,
    ) -> Result<OperationResult, NodeError> {
        match self {
            PollOutcome::Completed(result) => Ok(result),
            PollOutcome::Failed(result) => Err(NodeError::OperationFailed {
                operation: operation.to_string(),
                operation_id: operation_id.to_string(),
                message: result
                    .error_message()
                    .or(result.error_type())
                    .unwrap_or("no error details")
                    .to_string(),
            }),
            exhausted => exhausted.into_terminal(operation, operation_id),
        }
    }

    /// The last result of a finished operation, `COMPLETED` or `FAILED`.
    /// Only running out of attempts is an error.
    pub fn into_terminal(
        self,
        operation: OperationType,
        operation_id: &str,
    ) -> Result<OperationResult, NodeError> {
        match self {
            PollOutcome::Completed(result) | PollOutcome::Failed(result) => Ok(result),
            PollOutcome::Exhausted {
                attempts,
                last_status,
                last_error,
            } => {
                let last_status = match (last_status, last_error) {
                    (Some(status), _) => status.to_string(),
                    (None, Some(error)) => format!("error: {error}"),
                    (None, None) => "none".into(),
                };
                Err(NodeError::RetriesExhausted {
                    operation: operation.to_string(),
                    operation_id: operation_id.to_string(),
                    attempts,
                    last_status,
                })
            }
        }
    }
}

/// Poll `operation_id` until it reaches a terminal status or the policy runs out.
///
/// Transport errors and non-terminal statuses are retried. `FAILED` stops the
/// loop immediately.
pub fn poll_operation<N, S>(
    node: &N,
    sleeper: &S,
    operation: OperationType,
    operation_id: &str,
    policy: RetryPolicy,
) -> PollOutcome
where
    N: NodeApi + ?Sized,
    S: Sleeper + ?Sized,
{
    let attempts = policy.max_retries.max(1);
    let mut last_status = None;
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            sleeper.sleep(policy.frequency);
        }
        match node.get_operation_result(operation, operation_id) {
            Ok(result) if result.status == OperationStatus::Completed => {
                tracing::debug!(%operation, operation_id, attempt, "operation completed");
                return PollOutcome::Completed(result);
            }
            Ok(result) if result.status == OperationStatus::Failed => {
                tracing::warn!(
                    %operation,
                    operation_id,
                    error = result.error_message().unwrap_or_default(),
                    "operation failed"
                );
                return PollOutcome::Failed(result);
            }
            Ok(result) => {
                tracing::debug!(%operation, operation_id, attempt, status = %result.status, "operation pending");
                last_status = Some(result.status);
            }
            Err(e) => {
                tracing::debug!(%operation, operation_id, attempt, error = %e, "operation status request failed");
                last_error = Some(e.to_string());
            }
        }
    }

    tracing::warn!(%operation, operation_id, attempts, "operation did not finish");
    PollOutcome::Exhausted {
        attempts,
        last_status,
        last_error,
    }
}

/// Poll the finality status of `ual` until `required` confirmations are seen
/// or the policy runs out. Returns the highest confirmation count observed.
pub fn await_finality<N, S>(node: &N, sleeper: &S, ual: &str, required: u32, policy: RetryPolicy) -> u32
where
    N: NodeApi + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut finality = 0;
    for attempt in 1..=policy.max_retries.max(1) {
        if attempt > 1 {
            sleeper.sleep(policy.frequency);
        }
        match node.finality_status(ual) {
            Ok(confirmations) => {
                finality = finality.max(confirmations);
                if finality >= required {
                    break;
                }
            }
            Err(e) => tracing::debug!(ual, attempt, error = %e, "finality status request failed"),
        }
    }
    tracing::debug!(ual, finality, required, "finality polling finished");
    finality
}
