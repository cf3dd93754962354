//! Scheduler configuration models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 1440;
pub const MIN_TIMEOUT_MINUTES: u32 = 1;
pub const MAX_TIMEOUT_MINUTES: u32 = 120;
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Rejected scheduler configuration update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("schedule interval must be between 1 and 1440 minutes (got {0})")]
    Interval(u32),
    #[error("timeout must be between 1 and 120 minutes (got {0})")]
    Timeout(u32),
    #[error("max concurrent workers must be at least 1")]
    Workers,
    #[error("retry attempts must be at most 10 (got {0})")]
    RetryAttempts(u32),
}

/// Persisted scheduler configuration (single row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub is_enabled: bool,
    pub schedule_interval_minutes: u32,
    pub last_scheduled_run: Option<DateTime<Utc>>,
    pub next_scheduled_run: Option<DateTime<Utc>>,
    /// Bounds fan-out within one run, not across runs.
    pub max_concurrent_workers: u32,
    /// Per-configuration fetch timeout.
    pub timeout_minutes: u32,
    /// Retry budget for whole-search fetches.
    pub retry_attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            schedule_interval_minutes: 10,
            last_scheduled_run: None,
            next_scheduled_run: None,
            max_concurrent_workers: 5,
            timeout_minutes: 5,
            retry_attempts: 3,
            updated_at: Utc::now(),
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.schedule_interval_minutes))
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.timeout_minutes) * 60)
    }

    /// Next run is always measured from `from`, never from a fixed phase.
    pub fn next_run_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.is_enabled.then(|| from + self.interval())
    }

    /// Whether a scheduled run is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && self.next_scheduled_run.is_some_and(|next| next <= now)
    }
}

/// Partial update to the scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfigUpdate {
    pub is_enabled: Option<bool>,
    pub schedule_interval_minutes: Option<u32>,
    pub max_concurrent_workers: Option<u32>,
    pub timeout_minutes: Option<u32>,
    pub retry_attempts: Option<u32>,
}

impl SchedulerConfigUpdate {
    /// Validate every provided field; nothing is applied unless all pass.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(interval) = self.schedule_interval_minutes {
            if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&interval) {
                return Err(ConfigValidationError::Interval(interval));
            }
        }
        if let Some(timeout) = self.timeout_minutes {
            if !(MIN_TIMEOUT_MINUTES..=MAX_TIMEOUT_MINUTES).contains(&timeout) {
                return Err(ConfigValidationError::Timeout(timeout));
            }
        }
        if self.max_concurrent_workers == Some(0) {
            return Err(ConfigValidationError::Workers);
        }
        if let Some(retries) = self.retry_attempts {
            if retries > MAX_RETRY_ATTEMPTS {
                return Err(ConfigValidationError::RetryAttempts(retries));
            }
        }
        Ok(())
    }

    /// Validate, then produce the updated settings.
    pub fn apply(&self, current: &SchedulerSettings) -> Result<SchedulerSettings, ConfigValidationError> {
        self.validate()?;
        let mut next = current.clone();
        if let Some(v) = self.is_enabled {
            next.is_enabled = v;
        }
        if let Some(v) = self.schedule_interval_minutes {
            next.schedule_interval_minutes = v;
        }
        if let Some(v) = self.max_concurrent_workers {
            next.max_concurrent_workers = v;
        }
        if let Some(v) = self.timeout_minutes {
            next.timeout_minutes = v;
        }
        if let Some(v) = self.retry_attempts {
            next.retry_attempts = v;
        }
        next.updated_at = Utc::now();
        Ok(next)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SchedulerSettings::default();
        assert!(settings.is_enabled);
        assert_eq!(settings.schedule_interval_minutes, 10);
        assert_eq!(settings.max_concurrent_workers, 5);
        assert_eq!(settings.timeout_minutes, 5);
        assert_eq!(settings.retry_attempts, 3);
    }

    #[test]
    fn test_interval_bounds() {
        for ok in [1, 60, 1440] {
            let update = SchedulerConfigUpdate {
                schedule_interval_minutes: Some(ok),
                ..Default::default()
            };
            assert!(update.validate().is_ok(), "{} should be valid", ok);
        }
        for bad in [0, 1441] {
            let update = SchedulerConfigUpdate {
                schedule_interval_minutes: Some(bad),
                ..Default::default()
            };
            assert_eq!(update.validate(), Err(ConfigValidationError::Interval(bad)));
        }
    }

    #[test]
    fn test_timeout_bounds() {
        let update = SchedulerConfigUpdate {
            timeout_minutes: Some(121),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ConfigValidationError::Timeout(121)));
    }

    #[test]
    fn test_invalid_update_leaves_settings_untouched() {
        let current = SchedulerSettings::default();
        let update = SchedulerConfigUpdate {
            is_enabled: Some(false),
            schedule_interval_minutes: Some(30),
            timeout_minutes: Some(0),
            ..Default::default()
        };
        assert!(update.apply(&current).is_err());
        assert!(current.is_enabled);
        assert_eq!(current.schedule_interval_minutes, 10);
    }

    #[test]
    fn test_apply_partial() {
        let current = SchedulerSettings::default();
        let update = SchedulerConfigUpdate {
            schedule_interval_minutes: Some(30),
            ..Default::default()
        };
        let next = update.apply(&current).unwrap();
        assert_eq!(next.schedule_interval_minutes, 30);
        assert_eq!(next.timeout_minutes, current.timeout_minutes);
    }

    #[test]
    fn test_next_run_and_due() {
        let mut settings = SchedulerSettings::default();
        let now = Utc::now();
        let next = settings.next_run_after(now).unwrap();
        assert_eq!(next - now, Duration::minutes(10));

        settings.next_scheduled_run = Some(now - Duration::seconds(1));
        assert!(settings.is_due(now));

        settings.is_enabled = false;
        assert!(!settings.is_due(now));
        assert!(settings.next_run_after(now).is_none());
    }
}
