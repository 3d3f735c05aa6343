//! Referral Engine Configuration
//!
//! Commission schedule, retry policy and enrollment limits.
//! Loadable from TOML; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use lib_types::Bps;

use crate::commission::{CommissionSchedule, MAX_LEVELS};
use crate::errors::{ReferralError, ReferralResult};

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReferralConfig {
    pub commission: CommissionConfig,
    pub retry: RetryPolicy,
    pub enrollment: EnrollmentConfig,
    pub notifications: NotificationConfig,
}

// =========================================================================
// Commission
// =========================================================================

/// Commission pool and per-level split, in basis points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    /// Share of a qualifying amount reserved for the whole pool (1000 = 10%)
    pub pool_rate_bps: Bps,
    /// Share of the pool paid to levels 1..=5
    pub level_rates_bps: [Bps; MAX_LEVELS],
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            pool_rate_bps: 1_000,                            // 10%
            level_rates_bps: [5_000, 2_500, 1_250, 625, 625], // 50 / 25 / 12.5 / 6.25 / 6.25
        }
    }
}

impl CommissionConfig {
    pub fn schedule(&self) -> ReferralResult<CommissionSchedule> {
        CommissionSchedule::new(self.pool_rate_bps, self.level_rates_bps)
    }
}

// =========================================================================
// Retry
// =========================================================================

/// Bounded exponential backoff for optimistic write conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first conflict
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

// =========================================================================
// Enrollment
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Length of generated referral codes
    pub referral_code_length: usize,
    /// Collision retries before giving up
    pub code_generation_attempts: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            referral_code_length: 8,
            code_generation_attempts: 8,
        }
    }
}

// =========================================================================
// Notifications
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Pending notifications kept before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024 }
    }
}

impl ReferralConfig {
    /// Fast retries for tests; same commission schedule as production
    pub fn for_testing() -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: 50,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            ..Self::default()
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ReferralResult<()> {
        self.commission.schedule()?;

        if self.retry.max_attempts == 0 {
            return Err(ReferralError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ReferralError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        let code_len = self.enrollment.referral_code_length;
        if !(lib_types::ReferralCode::MIN_LEN..=lib_types::ReferralCode::MAX_LEN).contains(&code_len) {
            return Err(ReferralError::Config(format!(
                "enrollment.referral_code_length must be {}-{}",
                lib_types::ReferralCode::MIN_LEN,
                lib_types::ReferralCode::MAX_LEN
            )));
        }
        if self.enrollment.code_generation_attempts == 0 {
            return Err(ReferralError::Config(
                "enrollment.code_generation_attempts must be at least 1".into(),
            ));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(ReferralError::Config("notifications.queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> ReferralResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ReferralError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ReferralResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReferralError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}
