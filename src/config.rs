use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::SupervisorError;

// ============================================================================
// Manager Configuration
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How often the health monitor scans the consumer registry
    pub check_interval: Duration,
    /// Upper bound on a single `kill` call before the supervisor moves on
    pub kill_timeout: Duration,
    /// Backoff applied to slots whose recreation failed
    pub recreate_backoff: RetryConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(5),
            recreate_backoff: RetryConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn with_recreate_backoff(mut self, backoff: RetryConfig) -> Self {
        self.recreate_backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.check_interval.is_zero() {
            return Err(SupervisorError::InvalidConfig(
                "check_interval must be greater than zero".to_string(),
            ));
        }
        if self.kill_timeout.is_zero() {
            return Err(SupervisorError::InvalidConfig(
                "kill_timeout must be greater than zero".to_string(),
            ));
        }
        if self.recreate_backoff.multiplier < 1.0 {
            return Err(SupervisorError::InvalidConfig(
                "recreate_backoff.multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Recreation Backoff Settings
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of recreation attempts before a slot is abandoned
    pub max_attempts: u32,
    /// Delay before the first retry (zero means "on the next tick")
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Keep retrying for a long time, starting right away
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
        }
    }

    /// Give up quickly
    pub fn conservative() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}
