//! Server-wide configuration: the executor's own tunables plus the
//! knobs the ambient HTTP/db surface itself needs. Loaded from YAML via
//! [`loader::load_yaml_config`]; every field has a default so a missing
//! config file (or a partially-specified one merged from `$include`s)
//! still produces a runnable server.

pub mod loader;

use serde::{Deserialize, Serialize};

use dagctl_core::{AilConfig, Concurrency, ExecutorConfig, HilConfig, RetryConfig, TimeoutsConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
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
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
            max_concurrency: executor.max_concurrency,
            task_timeout_ms: executor.task_timeout_ms,
            ail: executor.ail,
            hil: executor.hil,
            timeouts: executor.timeouts,
            per_layer_validation: executor.per_layer_validation,
            user_id: executor.user_id,
            rate_limit_default_capacity: executor.rate_limit_default_capacity,
            rate_limit_default_period_ms: executor.rate_limit_default_period_ms,
            checkpoint_retention: executor.checkpoint_retention,
            max_replans: executor.max_replans,
            retry: executor.retry,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrency: self.max_concurrency.clone(),
            task_timeout_ms: self.task_timeout_ms,
            ail: self.ail,
            hil: self.hil,
            timeouts: self.timeouts,
            per_layer_validation: self.per_layer_validation,
            user_id: self.user_id.clone(),
            rate_limit_default_capacity: self.rate_limit_default_capacity,
            rate_limit_default_period_ms: self.rate_limit_default_period_ms,
            checkpoint_retention: self.checkpoint_retention,
            max_replans: self.max_replans,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_runnable() {
        let config = Config::default();
        assert_eq!(config.task_timeout_ms, 30_000);
        assert!(!config.ail.enabled);
    }

    #[test]
    fn executor_config_round_trips_fields() {
        let mut config = Config::default();
        config.task_timeout_ms = 1234;
        config.max_replans = 7;
        let executor = config.executor_config();
        assert_eq!(executor.task_timeout_ms, 1234);
        assert_eq!(executor.max_replans, 7);
    }
}
