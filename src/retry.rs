//! Conflict retry with bounded exponential backoff.

use crate::error::MigrateError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff policy for optimistic-concurrency conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Delay before the second attempt (milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after every attempt
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Extra random fraction of the delay, in [0, jitter)
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Upper bound for a single delay (milliseconds); None means unbounded
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

fn default_steps() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_factor() -> f64 {
    1.0
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            initial_delay_ms: default_initial_delay_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
            max_delay_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries `steps` times without sleeping.
    pub fn immediate(steps: u32) -> Self {
        Self {
            steps,
            initial_delay_ms: 0,
            factor: 1.0,
            jitter: 0.0,
            max_delay_ms: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.factor < 1.0 || !self.factor.is_finite() {
            return Err(format!("retry factor must be >= 1.0, got {}", self.factor));
        }
        if self.jitter < 0.0 || !self.jitter.is_finite() {
            return Err(format!("retry jitter must be >= 0.0, got {}", self.jitter));
        }
        Ok(())
    }

    /// Un-jittered delay after `attempt` failed attempts (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay_ms as f64 * self.factor.powi(exponent);
        let millis = match self.max_delay_ms {
            Some(max) => millis.min(max as f64),
            None => millis,
        };
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..self.jitter);
        base + base.mul_f64(extra)
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or the policy's
/// attempts are exhausted. Only conflicts are retried; the last conflict is returned.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, MigrateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MigrateError>>,
{
    let attempts = policy.steps.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(err) if err.is_conflict() && attempt < attempts => {
                let delay = policy.delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "conflict, retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            result => return result,
        }
    }
}
