//! Scheduler configuration.
//!
//! Loaded via the `config` crate from environment variables prefixed with
//! `PULSE_SCHEDULER_`, for example `PULSE_SCHEDULER_FAILURE_THRESHOLD=3`.

use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use std::time::Duration;

/// Settings applied to every task the scheduler creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Default time budget for one fire cycle, in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,

    /// Consecutive failures before a task is disabled. Zero never disables.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_deadline_ms() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_deadline_ms: default_deadline_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl SchedulerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(
            config::Config::builder().add_source(
                config::Environment::with_prefix("PULSE_SCHEDULER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Returns the default deadline as a duration.
    #[must_use]
    pub fn default_deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_has_correct_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.default_deadline(), Duration::from_secs(5));
        assert_eq!(config.failure_threshold, 10);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = SchedulerConfig::load(config::Config::builder()).expect("loads");
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let builder = config::Config::builder()
            .set_override("failure_threshold", 3)
            .expect("valid override");
        let config = SchedulerConfig::load(builder).expect("loads");
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.default_deadline_ms, 5_000);
    }
}
