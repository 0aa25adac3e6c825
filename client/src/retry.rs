use crate::{Classification, ErrorClassifier, LedgerError, TransactionHandle};
use rand::{Rng, RngCore};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Attempt budget and backoff between attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    /// Draw each delay from [backoff/2, backoff] instead of sleeping `backoff`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(2_000),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            jitter: false,
        }
    }

    /// Same backoff, exactly one attempt.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay(&self, rng: &mut impl RngCore) -> Duration {
        let ceiling = self.backoff.as_millis() as u64;
        if !self.jitter || ceiling < 2 {
            return self.backoff;
        }
        // Uniform over the upper half of the backoff window.
        Duration::from_millis(rng.gen_range(ceiling / 2..=ceiling))
    }
}

/// Whether running out of attempts is worth a warning. A single-attempt budget
/// leaves failure handling to the caller.
fn warns_on_exhaustion(max_attempts: u32) -> bool {
    max_attempts > 1
}

/// Why an operation produced no result.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: LedgerError },
    #[error("unclassified ledger failure: {0}")]
    Unclassified(LedgerError),
}

impl Failure {
    pub fn error(&self) -> &LedgerError {
        match self {
            Failure::Exhausted { last, .. } => last,
            Failure::Unclassified(err) => err,
        }
    }
}

/// Result of driving one operation through a [RetryExecutor].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The ledger accepted and finalized the operation.
    Confirmed(T),
    /// The ledger rejected the operation for a recognized domain reason.
    Sentinel { reason: String },
    Failed(Failure),
}

pub type TransactionOutcome = Outcome<TransactionHandle>;

impl<T> Outcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }

    pub fn sentinel(&self) -> Option<&str> {
        match self {
            Outcome::Sentinel { reason } => Some(reason),
            _ => None,
        }
    }

}

/// Bounded-retry driver that consults an [ErrorClassifier] after each failed
/// attempt.
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    classifier: ErrorClassifier,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(classifier: ErrorClassifier, policy: RetryPolicy) -> Self {
        Self { classifier, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` under the default policy.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        self.run_with(&self.policy, operation).await
    }

    /// Invoke `operation` up to `policy.max_attempts` times (at least once).
    /// Sentinel and fatal failures end the loop immediately; transient ones are
    /// retried after the backoff.
    pub async fn run_with<T, F, Fut>(&self, policy: &RetryPolicy, mut operation: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Outcome::Confirmed(value),
                Err(err) => err,
            };
            match self.classifier.classify(&err) {
                Classification::Sentinel(reason) => {
                    debug!(attempt, %reason, error = %err, "sentinel outcome");
                    return Outcome::Sentinel { reason };
                }
                Classification::Fatal => {
                    return Outcome::Failed(Failure::Unclassified(err));
                }
                Classification::Transient if attempt >= max_attempts => {
                    if warns_on_exhaustion(max_attempts) {
                        warn!(attempts = attempt, error = %err, "all attempts failed");
                    }
                    return Outcome::Failed(Failure::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Classification::Transient => {
                    let delay = policy.delay(&mut rand::thread_rng());
                    warn!(
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %err,
                        "transient ledger error; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
