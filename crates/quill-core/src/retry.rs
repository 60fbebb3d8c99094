use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    /// A bound of zero is treated as one: the operation always runs once.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub attempt: usize,
    pub error: String,
}

#[derive(Debug, Clone, Error)]
#[error("gave up after {attempts} attempts: {}", last_error(.failures))]
pub struct RetryExhausted {
    pub attempts: usize,
    pub failures: Vec<AttemptFailure>,
}

fn last_error(failures: &[AttemptFailure]) -> &str {
    failures
        .last()
        .map(|f| f.error.as_str())
        .unwrap_or("no attempt was made")
}

/// Runs `op` until it succeeds or `policy.max_attempts()` calls have failed.
///
/// `op` receives the 1-based attempt number. There is no delay between
/// attempts.
pub fn retry_with_policy<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryExhausted>
where
    F: FnMut(usize) -> anyhow::Result<T>,
{
    let mut failures = Vec::new();
    for attempt in 1..=policy.max_attempts() {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                let error = format!("{err:#}");
                debug!(attempt, max = policy.max_attempts(), %error, "attempt failed");
                failures.push(AttemptFailure { attempt, error });
            }
        }
    }

    Err(RetryExhausted {
        attempts: policy.max_attempts(),
        failures,
    })
}
