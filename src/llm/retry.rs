//! Retry and call-budget middleware for LLM calls.
//!
//! Every LLM-touching workflow step goes through `complete_with_retry`:
//! transient provider failures are retried with exponential backoff, and
//! each attempt counts against a per-run call budget so a misbehaving run
//! cannot loop on the provider indefinitely.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Retry policy for transient LLM failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts per logical call.
    pub max_attempts: u32,
    /// Base delay; doubled on each subsequent attempt.
    pub base_delay: Duration,
    /// Upper bound on the random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based). Attempt 1 ran already,
    /// so this is the wait before attempt 2, 3, ...
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let jitter_ms = if self.max_jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64)
        };
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Per-run LLM call counter with a hard limit.
#[derive(Debug)]
pub struct CallBudget {
    used: AtomicU32,
    limit: u32,
}

impl CallBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            used: AtomicU32::new(0),
            limit,
        }
    }

    /// Record one call. Returns the call number (1-based) or an error
    /// once the limit is exceeded.
    pub fn try_acquire(&self) -> Result<u32, LlmError> {
        let used = self.used.fetch_add(1, Ordering::SeqCst) + 1;
        if used > self.limit {
            warn!(used, limit = self.limit, "LLM call budget exhausted");
            return Err(LlmError::CallBudgetExhausted {
                used,
                limit: self.limit,
            });
        }
        Ok(used)
    }

    /// Calls recorded so far (including any rejected over-limit attempts).
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Calls actually allowed through (capped at the limit).
    pub fn spent(&self) -> u32 {
        self.used().min(self.limit)
    }
}

/// Whether an error is worth retrying.
fn is_transient(error: &LlmError) -> bool {
    matches!(
        error,
        LlmError::RequestFailed { .. } | LlmError::RateLimited { .. }
    )
}

/// Invoke the provider with retry and budget accounting.
///
/// Each attempt (including retries) counts against the budget, matching the
/// per-run limit semantics: a flaky provider burns budget, it does not get
/// free retries.
pub async fn complete_with_retry(
    llm: &dyn LlmProvider,
    request: CompletionRequest,
    policy: &RetryPolicy,
    budget: &CallBudget,
) -> Result<CompletionResponse, LlmError> {
    let mut last_error: Option<LlmError> = None;

    for attempt in 1..=policy.max_attempts {
        let call_number = budget.try_acquire()?;
        tracing::debug!(
            model = llm.model_name(),
            call_number,
            attempt,
            "LLM call"
        );

        match llm.complete(request.clone()).await {
            Ok(response) => {
                if attempt > 1 {
                    tracing::info!(attempt, "LLM call succeeded after retry");
                }
                return Ok(response);
            }
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "LLM call failed, retrying"
                );
                last_error = Some(e);
                tokio::time::sleep(delay).await;
            }
            Err(e) if is_transient(&e) => {
                warn!(attempts = policy.max_attempts, error = %e, "All LLM attempts failed");
                return Err(LlmError::RetriesExhausted {
                    attempts: policy.max_attempts,
                    last_error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    // Unreachable with max_attempts >= 1; kept for a zero-attempt policy.
    Err(last_error.unwrap_or(LlmError::RetriesExhausted {
        attempts: policy.max_attempts,
        last_error: "no attempts were made".into(),
    }))
}
