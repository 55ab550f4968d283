use crate::error::{AssistError, AttemptError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Retry and timeout budget for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(25),
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows attempt `attempt_index` (0-based).
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt_index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Attempting { attempt: u32 },
    RetryWait { attempt: u32, delay: Duration },
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(AttemptError),
    TimedOut,
}

/// Record of one attempt, kept only while the call runs.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub started_at: Instant,
    pub outcome: AttemptOutcome,
}

fn transition(state: &mut OrchestratorState, next: OrchestratorState) {
    log::debug!("orchestrator: {:?} -> {:?}", state, next);
    *state = next;
}

/// Drives `perform_attempt` under `policy`.
///
/// Each attempt races a timer; when the timer wins the attempt future is
/// dropped, which cancels the in-flight call, and the whole operation fails
/// with [`AssistError::TimedOut`]. 4xx failures end the operation at once.
/// Server and network failures back off exponentially until the budget is spent.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut perform_attempt: F) -> Result<T, AssistError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut state = OrchestratorState::Idle;
    let mut history: Vec<RetryAttempt> = Vec::with_capacity(max_attempts as usize);

    for attempt_index in 0..max_attempts {
        let attempt_number = attempt_index + 1;
        transition(&mut state, OrchestratorState::Attempting { attempt: attempt_number });
        let started_at = Instant::now();

        let outcome = tokio::time::timeout(policy.attempt_timeout, perform_attempt(attempt_number)).await;

        let error = match outcome {
            Ok(Ok(value)) => {
                history.push(RetryAttempt {
                    attempt_number,
                    started_at,
                    outcome: AttemptOutcome::Succeeded,
                });
                transition(&mut state, OrchestratorState::Success);
                return Ok(value);
            }
            Err(_elapsed) => {
                history.push(RetryAttempt {
                    attempt_number,
                    started_at,
                    outcome: AttemptOutcome::TimedOut,
                });
                log::error!(
                    "AI request timed out after {:?} on attempt {}",
                    policy.attempt_timeout,
                    attempt_number
                );
                transition(&mut state, OrchestratorState::Failed);
                return Err(AssistError::TimedOut);
            }
            Ok(Err(error)) => error,
        };

        history.push(RetryAttempt {
            attempt_number,
            started_at,
            outcome: AttemptOutcome::Failed(error.clone()),
        });

        if !error.is_retryable() {
            log::warn!("AI request rejected on attempt {}: {}", attempt_number, error);
            transition(&mut state, OrchestratorState::Failed);
            let status = match &error {
                AttemptError::Status { status, .. } => *status,
                AttemptError::Network(_) => 0,
            };
            return Err(AssistError::Rejected {
                status,
                message: error.to_string(),
            });
        }

        log::warn!("AI request attempt {} failed: {}", attempt_number, error);
        if attempt_number >= max_attempts {
            transition(&mut state, OrchestratorState::Failed);
            log::error!(
                "AI request failed after {} attempts: {:?}",
                history.len(),
                history.iter().map(|a| &a.outcome).collect::<Vec<_>>()
            );
            return Err(AssistError::Exhausted {
                attempts: attempt_number,
                last_error: error.to_string(),
            });
        }

        let delay = policy.backoff(attempt_index);
        transition(&mut state, OrchestratorState::RetryWait { attempt: attempt_number, delay });
        tokio::time::sleep(delay).await;
    }

    unreachable!("the final attempt always returns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn server_error() -> AttemptError {
        AttemptError::Status {
            status: 500,
            message: "The AI service failed to process the request.".into(),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retry_twice_with_growing_waits() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy::default();

        let result: Result<(), _> = run_with_retry(&policy, |_| {
            let starts = starts.clone();
            async move {
                starts.lock().unwrap().push(Instant::now());
                Err(server_error())
            }
        })
        .await;

        assert!(matches!(result, Err(AssistError::Exhausted { attempts: 3, .. })));
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("Failed to get AI suggestions after multiple attempts"));

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 3);
        let first_wait = starts[1] - starts[0];
        let second_wait = starts[2] - starts[1];
        assert!(first_wait >= Duration::from_secs(1));
        assert!(second_wait > first_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_are_not_retried() {
        for status in [400u16, 429] {
            let calls = Arc::new(Mutex::new(0));
            let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), |_| {
                let calls = calls.clone();
                async move {
                    *calls.lock().unwrap() += 1;
                    Err(AttemptError::Status {
                        status,
                        message: "Too many requests. Please try again after a short break.".into(),
                    })
                }
            })
            .await;

            assert_eq!(*calls.lock().unwrap(), 1);
            assert_eq!(
                result.unwrap_err(),
                AssistError::Rejected {
                    status,
                    message: "Too many requests. Please try again after a short break.".into(),
                }
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts_without_retry() {
        let calls = Arc::new(Mutex::new(0));
        let finished = Arc::new(Mutex::new(false));

        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), |_| {
            let calls = calls.clone();
            let finished = finished.clone();
            async move {
                *calls.lock().unwrap() += 1;
                tokio::time::sleep(Duration::from_secs(60)).await;
                *finished.lock().unwrap() = true;
                Ok(())
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), AssistError::TimedOut);
        assert_eq!(*calls.lock().unwrap(), 1);
        // The abandoned attempt never resumes.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!*finished.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_retry_succeeds() {
        let result = run_with_retry(&RetryPolicy::default(), |attempt| async move {
            if attempt < 3 {
                Err(AttemptError::Network("connection reset".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }
}
