//! Execution log models for tracking scraper runs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a running execution refreshes its heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A `running` execution silent for this long belongs to a dead process.
pub const HEARTBEAT_STALE_SECS: i64 = 120;

/// Heartbeats older than the returned instant are stale.
pub fn stale_before(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::seconds(HEARTBEAT_STALE_SECS)
}

/// Lifecycle state of one scraper execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Running totals for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Search configurations attempted.
    pub total_searches: u32,
    /// Configurations whose records were committed.
    pub successful_searches: u32,
    /// Listing detail records fetched successfully.
    pub total_properties: u32,
    /// Records committed to the property store.
    pub properties_saved: u32,
}

impl RunCounters {
    /// Fold one configuration's outcome into the totals.
    pub fn record(&mut self, observed: u32, saved: u32, success: bool) {
        self.total_searches += 1;
        self.total_properties += observed;
        self.properties_saved += saved;
        if success {
            self.successful_searches += 1;
        }
    }
}

/// Durable record of one scraper run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    /// Set exactly once, when the status becomes terminal.
    pub end_time: Option<DateTime<Utc>>,
    pub counters: RunCounters,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    /// Per-execution log artifact.
    pub log_file_path: Option<String>,
    /// Last sign of life from the process running this execution.
    pub heartbeat_at: Option<DateTime<Utc>>,
}

impl ExecutionLog {
    /// Create a new running execution with a fresh id.
    pub fn start(log_file_path: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            status: ExecutionStatus::Running,
            start_time: now,
            end_time: None,
            counters: RunCounters::default(),
            error_message: None,
            error_details: None,
            log_file_path,
            heartbeat_at: Some(now),
        }
    }

    /// Whether this execution is running in a process that is still alive.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == ExecutionStatus::Running
            && self.heartbeat_at.unwrap_or(self.start_time) >= stale_before(now)
    }

    /// Wall-clock duration, or time elapsed so far for a running execution.
    pub fn duration(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_roundtrip() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            assert_eq!(ExecutionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::from_str("paused"), None);
    }

    #[test]
    fn test_only_running_is_non_terminal() {
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_counters_record() {
        let mut counters = RunCounters::default();
        counters.record(3, 3, true);
        counters.record(2, 0, false);
        assert_eq!(
            counters,
            RunCounters {
                total_searches: 2,
                successful_searches: 1,
                total_properties: 5,
                properties_saved: 3,
            }
        );
    }

    #[test]
    fn test_start_generates_unique_ids() {
        let a = ExecutionLog::start(None);
        let b = ExecutionLog::start(None);
        assert_ne!(a.execution_id, b.execution_id);
        assert_eq!(a.status, ExecutionStatus::Running);
        assert!(a.end_time.is_none());
        assert_eq!(a.heartbeat_at, Some(a.start_time));
    }

    #[test]
    fn test_liveness_follows_heartbeat() {
        let now = Utc::now();
        let mut log = ExecutionLog::start(None);
        assert!(log.is_live(now));

        log.heartbeat_at = Some(now - chrono::Duration::seconds(HEARTBEAT_STALE_SECS + 1));
        assert!(!log.is_live(now));

        log.heartbeat_at = Some(now);
        log.status = ExecutionStatus::Completed;
        assert!(!log.is_live(now));
    }
}
