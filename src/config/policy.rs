// ABOUTME: Rollout and stage policy constants.
// ABOUTME: Canary weight, monitoring window, settle delay, approval, rollout, and call timeouts.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Policy {
    /// Percentage of traffic routed to the canary.
    #[serde(default = "default_canary_weight")]
    pub canary_weight: u8,

    #[serde(default = "default_monitoring_window", with = "humantime_serde")]
    pub monitoring_window: Duration,

    #[serde(default = "default_monitoring_interval", with = "humantime_serde")]
    pub monitoring_interval: Duration,

    /// Error rate (0.0..=1.0) above which a canary sample raises an alarm.
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,

    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    #[serde(default = "default_approval_timeout", with = "humantime_serde")]
    pub approval_timeout: Duration,

    #[serde(default = "default_rollout_timeout", with = "humantime_serde")]
    pub rollout_timeout: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Longest wait for any single cluster or health call.
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,

    #[serde(default = "default_stage_timeout", with = "humantime_serde")]
    pub stage_timeout: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            canary_weight: default_canary_weight(),
            monitoring_window: default_monitoring_window(),
            monitoring_interval: default_monitoring_interval(),
            max_error_rate: default_max_error_rate(),
            settle_delay: default_settle_delay(),
            approval_timeout: default_approval_timeout(),
            rollout_timeout: default_rollout_timeout(),
            poll_interval: default_poll_interval(),
            call_timeout: default_call_timeout(),
            stage_timeout: default_stage_timeout(),
        }
    }
}

impl Policy {
    pub fn validate(&self) -> Result<()> {
        if !(1..=99).contains(&self.canary_weight) {
            return Err(Error::InvalidConfig(format!(
                "policy.canary_weight must be between 1 and 99, got {}",
                self.canary_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.max_error_rate) {
            return Err(Error::InvalidConfig(format!(
                "policy.max_error_rate must be between 0 and 1, got {}",
                self.max_error_rate
            )));
        }
        if self.poll_interval.is_zero() || self.monitoring_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "policy poll and monitoring intervals must be non-zero".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::InvalidConfig("policy.call_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn default_canary_weight() -> u8 {
    10
}

fn default_monitoring_window() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_monitoring_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_error_rate() -> f64 {
    0.05
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_approval_timeout() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_rollout_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_stage_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}
