//! Executor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AilDecisionPoint {
    PerLayer,
    OnError,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HilApprovalRequired {
    Always,
    CriticalOnly,
    Never,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AilConfig {
    pub enabled: bool,
    pub decision_point: AilDecisionPoint,
}

impl Default for AilConfig {
    fn default() -> Self {
        Self { enabled: false, decision_point: AilDecisionPoint::OnError }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HilConfig {
    pub enabled: bool,
    pub approval_required: HilApprovalRequired,
}

impl Default for HilConfig {
    fn default() -> Self {
        Self { enabled: false, approval_required: HilApprovalRequired::CriticalOnly }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub hil_ms: u64,
    pub ail_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self { hil_ms: 300_000, ail_ms: 60_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Concurrency {
    Unbounded,
    Bounded(usize),
}

/// Bounded exponential backoff with jitter for transient dispatch
/// failures. `max_attempts` counts the first try, so `1` means no
/// retry at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_interval_ms: u64,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_interval_ms: 200, backoff_factor: 2.0, max_interval_ms: 5_000, jitter: true }
    }
}

impl RetryConfig {
    /// Delay before attempt number `attempt` (1-indexed, counting the
    /// attempt about to be made, so `attempt=2` is the first retry).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.initial_interval_ms as f64;
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = base * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_interval_ms as f64);
        let final_ms = if self.jitter {
            use rand::Rng;
            let jitter_factor = rand::thread_rng().gen_range(0.0..0.25);
            capped * (1.0 + jitter_factor)
        } else {
            capped
        };
        Duration::from_secs_f64(final_ms / 1000.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_concurrency: Concurrency,
    pub task_timeout_ms: u64,
    pub ail: AilConfig,
    pub hil: HilConfig,
    pub timeouts: TimeoutsConfig,
    pub per_layer_validation: bool,
    pub user_id: Option<String>,
    pub rate_limit_default_capacity: usize,
    pub rate_limit_default_period_ms: u64,
    pub checkpoint_retention: usize,
    pub max_replans: u32,
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Concurrency::Unbounded,
            task_timeout_ms: 30_000,
            ail: AilConfig::default(),
            hil: HilConfig::default(),
            timeouts: TimeoutsConfig::default(),
            per_layer_validation: false,
            user_id: None,
            rate_limit_default_capacity: 10,
            rate_limit_default_period_ms: 1000,
            checkpoint_retention: 5,
            max_replans: 3,
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn hil_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.hil_ms)
    }

    pub fn ail_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.ail_ms)
    }

    /// `None` for unbounded, matching `Semaphore::acquire` callers that
    /// skip the permit entirely rather than allocate a no-op semaphore.
    pub fn concurrency_limit(&self) -> Option<usize> {
        match self.max_concurrency {
            Concurrency::Unbounded => None,
            Concurrency::Bounded(n) => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_for_grows_exponentially_until_capped() {
        let retry = RetryConfig { max_attempts: 5, initial_interval_ms: 100, backoff_factor: 2.0, max_interval_ms: 1000, jitter: false };
        assert_eq!(retry.delay_for(1).as_millis(), 100);
        assert_eq!(retry.delay_for(2).as_millis(), 200);
        assert_eq!(retry.delay_for(3).as_millis(), 400);
        assert_eq!(retry.delay_for(4).as_millis(), 800);
        assert_eq!(retry.delay_for(5).as_millis(), 1000);
    }

    #[test]
    fn delay_for_with_jitter_stays_within_25_percent_above_base() {
        let retry = RetryConfig { max_attempts: 2, initial_interval_ms: 100, backoff_factor: 1.0, max_interval_ms: 1000, jitter: true };
        let delay = retry.delay_for(1).as_millis();
        assert!(delay >= 100 && delay <= 125, "jittered delay {delay} out of expected [100, 125] range");
    }

    #[test]
    fn unbounded_concurrency_has_no_limit() {
        let config = ExecutorConfig { max_concurrency: Concurrency::Unbounded, ..ExecutorConfig::default() };
        assert_eq!(config.concurrency_limit(), None);
    }

    #[test]
    fn bounded_concurrency_reports_its_limit() {
        let config = ExecutorConfig { max_concurrency: Concurrency::Bounded(4), ..ExecutorConfig::default() };
        assert_eq!(config.concurrency_limit(), Some(4));
    }
}
