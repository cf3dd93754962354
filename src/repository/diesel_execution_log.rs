//! Diesel-based execution log repository.
//!
//! Finalizing writes are filtered on `status = 'running'`, so a log that
//! reached a terminal status can never be moved again. A running log's
//! `heartbeat_at` is refreshed while its process is alive; only logs with a
//! stale heartbeat are treated as interrupted.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{ExecutionLogRecord, NewExecutionLog};
use super::pool::{DbPool, DieselError};
use super::util::{from_db_count, to_db_count};
use super::{parse_datetime, parse_datetime_opt};
use crate::models::{ExecutionLog, ExecutionStatus, RunCounters};
use crate::schema::scraper_logs;
use crate::with_conn;

/// Convert a database record to a domain model.
impl From<ExecutionLogRecord> for ExecutionLog {
    fn from(record: ExecutionLogRecord) -> Self {
        ExecutionLog {
            execution_id: record.execution_id,
            status: ExecutionStatus::from_str(&record.status).unwrap_or(ExecutionStatus::Failed),
            start_time: parse_datetime(&record.start_time),
            end_time: parse_datetime_opt(record.end_time),
            counters: RunCounters {
                total_searches: from_db_count(record.total_searches),
                successful_searches: from_db_count(record.successful_searches),
                total_properties: from_db_count(record.total_properties),
                properties_saved: from_db_count(record.properties_saved),
            },
            error_message: record.error_message,
            error_details: record.error_details,
            log_file_path: record.log_file_path,
            heartbeat_at: parse_datetime_opt(record.heartbeat_at),
        }
    }
}

/// Terminal outcome to record for a running execution.
#[derive(Debug, Clone)]
pub struct Finalization<'a> {
    pub status: ExecutionStatus,
    pub counters: RunCounters,
    pub error_message: Option<&'a str>,
    pub error_details: Option<&'a str>,
}

/// Execution audit log storage.
#[derive(Clone)]
pub struct DieselExecutionLogRepository {
    pool: DbPool,
}

impl DieselExecutionLogRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new execution log.
    pub async fn create(&self, log: &ExecutionLog) -> Result<(), DieselError> {
        let start_time = log.start_time.to_rfc3339();
        let end_time = log.end_time.map(|t| t.to_rfc3339());
        let heartbeat_at = log.heartbeat_at.map(|t| t.to_rfc3339());

        with_conn!(self.pool, conn => {
            diesel::insert_into(scraper_logs::table)
                .values(&NewExecutionLog {
                    execution_id: &log.execution_id,
                    status: log.status.as_str(),
                    start_time: &start_time,
                    end_time: end_time.as_deref(),
                    total_searches: to_db_count(log.counters.total_searches),
                    successful_searches: to_db_count(log.counters.successful_searches),
                    total_properties: to_db_count(log.counters.total_properties),
                    properties_saved: to_db_count(log.counters.properties_saved),
                    error_message: log.error_message.as_deref(),
                    error_details: log.error_details.as_deref(),
                    log_file_path: log.log_file_path.as_deref(),
                    heartbeat_at: heartbeat_at.as_deref(),
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Persist running totals and refresh the heartbeat. Ignored once the
    /// log is terminal.
    pub async fn update_progress(
        &self,
        execution_id: &str,
        counters: &RunCounters,
    ) -> Result<bool, DieselError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            let rows = diesel::update(
                scraper_logs::table
                    .filter(scraper_logs::execution_id.eq(execution_id))
                    .filter(scraper_logs::status.eq(ExecutionStatus::Running.as_str())),
            )
            .set((
                scraper_logs::total_searches.eq(to_db_count(counters.total_searches)),
                scraper_logs::successful_searches.eq(to_db_count(counters.successful_searches)),
                scraper_logs::total_properties.eq(to_db_count(counters.total_properties)),
                scraper_logs::properties_saved.eq(to_db_count(counters.properties_saved)),
                scraper_logs::heartbeat_at.eq(Some(now.as_str())),
            ))
            .execute(&mut conn)
            .await?;
            Ok(rows > 0)
        })
    }

    /// Refresh the heartbeat of a running log.
    pub async fn touch(&self, execution_id: &str) -> Result<bool, DieselError> {
        let now = Utc::now().to_rfc3339();
        with_conn!(self.pool, conn => {
            let rows = diesel::update(
                scraper_logs::table
                    .filter(scraper_logs::execution_id.eq(execution_id))
                    .filter(scraper_logs::status.eq(ExecutionStatus::Running.as_str())),
            )
            .set(scraper_logs::heartbeat_at.eq(Some(now.as_str())))
            .execute(&mut conn)
            .await?;
            Ok(rows > 0)
        })
    }

    /// Move a running log to a terminal status and stamp its end time.
    ///
    /// Returns false when the log was not running (already finalized or
    /// unknown); nothing is written in that case.
    pub async fn finalize(
        &self,
        execution_id: &str,
        outcome: &Finalization<'_>,
    ) -> Result<bool, DieselError> {
        if !outcome.status.is_terminal() {
            return Ok(false);
        }
        let end_time = Utc::now().to_rfc3339();
        let counters = outcome.counters;

        with_conn!(self.pool, conn => {
            let rows = diesel::update(
                scraper_logs::table
                    .filter(scraper_logs::execution_id.eq(execution_id))
                    .filter(scraper_logs::status.eq(ExecutionStatus::Running.as_str())),
            )
            .set((
                scraper_logs::status.eq(outcome.status.as_str()),
                scraper_logs::end_time.eq(Some(end_time.as_str())),
                scraper_logs::total_searches.eq(to_db_count(counters.total_searches)),
                scraper_logs::successful_searches.eq(to_db_count(counters.successful_searches)),
                scraper_logs::total_properties.eq(to_db_count(counters.total_properties)),
                scraper_logs::properties_saved.eq(to_db_count(counters.properties_saved)),
                scraper_logs::error_message.eq(outcome.error_message),
                scraper_logs::error_details.eq(outcome.error_details),
            ))
            .execute(&mut conn)
            .await?;
            Ok(rows > 0)
        })
    }

    /// Get an execution log by ID.
    pub async fn get(&self, execution_id: &str) -> Result<Option<ExecutionLog>, DieselError> {
        with_conn!(self.pool, conn => {
            scraper_logs::table
                .find(execution_id)
                .select(ExecutionLogRecord::as_select())
                .first::<ExecutionLogRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(ExecutionLog::from))
        })
    }

    /// Most recent executions first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ExecutionLog>, DieselError> {
        with_conn!(self.pool, conn => {
            scraper_logs::table
                .order(scraper_logs::start_time.desc())
                .limit(limit)
                .select(ExecutionLogRecord::as_select())
                .load::<ExecutionLogRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(ExecutionLog::from).collect())
        })
    }

    /// Get the most recent execution that reached a terminal status.
    pub async fn last_finished(&self) -> Result<Option<ExecutionLog>, DieselError> {
        with_conn!(self.pool, conn => {
            scraper_logs::table
                .filter(scraper_logs::status.ne(ExecutionStatus::Running.as_str()))
                .order(scraper_logs::start_time.desc())
                .select(ExecutionLogRecord::as_select())
                .first::<ExecutionLogRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(ExecutionLog::from))
        })
    }

    /// Running logs whose heartbeat is at or after `stale_before`.
    pub async fn list_live(&self, stale_before: DateTime<Utc>) -> Result<Vec<ExecutionLog>, DieselError> {
        let cutoff = stale_before.to_rfc3339();
        with_conn!(self.pool, conn => {
            scraper_logs::table
                .filter(scraper_logs::status.eq(ExecutionStatus::Running.as_str()))
                .filter(scraper_logs::heartbeat_at.ge(&cutoff))
                .order(scraper_logs::start_time.desc())
                .select(ExecutionLogRecord::as_select())
                .load::<ExecutionLogRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(ExecutionLog::from).collect())
        })
    }

    /// Cancel every `running` log whose heartbeat is older than `stale_before`.
    ///
    /// Used at scheduler start to close out runs whose process died. Runs
    /// still heartbeating in another process are left alone.
    pub async fn mark_interrupted(&self, stale_before: DateTime<Utc>) -> Result<usize, DieselError> {
        let end_time = Utc::now().to_rfc3339();
        let cutoff = stale_before.to_rfc3339();

        with_conn!(self.pool, conn => {
            diesel::update(
                scraper_logs::table
                    .filter(scraper_logs::status.eq(ExecutionStatus::Running.as_str()))
                    .filter(scraper_logs::heartbeat_at.lt(&cutoff)),
            )
            .set((
                scraper_logs::status.eq(ExecutionStatus::Cancelled.as_str()),
                scraper_logs::end_time.eq(Some(end_time.as_str())),
                scraper_logs::error_message.eq(Some("interrupted before completion")),
            ))
            .execute(&mut conn)
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stale_before;
    use crate::repository::test_support::setup_test_db;

    fn completed(counters: RunCounters) -> Finalization<'static> {
        Finalization {
            status: ExecutionStatus::Completed,
            counters,
            error_message: None,
            error_details: None,
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.execution_logs();

        let log = ExecutionLog::start(Some("/tmp/scraper_x.log".to_string()));
        repo.create(&log).await.unwrap();

        let mut counters = RunCounters::default();
        counters.record(3, 3, true);
        assert!(repo.update_progress(&log.execution_id, &counters).await.unwrap());

        let running = repo.get(&log.execution_id).await.unwrap().unwrap();
        assert_eq!(running.status, ExecutionStatus::Running);
        assert!(running.end_time.is_none());
        assert_eq!(running.counters.properties_saved, 3);

        assert!(repo.finalize(&log.execution_id, &completed(counters)).await.unwrap());
        let done = repo.get(&log.execution_id).await.unwrap().unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert!(done.end_time.is_some());
        assert_eq!(done.log_file_path.as_deref(), Some("/tmp/scraper_x.log"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.execution_logs();

        let log = ExecutionLog::start(None);
        repo.create(&log).await.unwrap();
        assert!(repo
            .finalize(&log.execution_id, &completed(RunCounters::default()))
            .await
            .unwrap());
        let first_end = repo.get(&log.execution_id).await.unwrap().unwrap().end_time;

        let failed = Finalization {
            status: ExecutionStatus::Failed,
            counters: RunCounters::default(),
            error_message: Some("late failure"),
            error_details: None,
        };
        assert!(!repo.finalize(&log.execution_id, &failed).await.unwrap());

        let mut counters = RunCounters::default();
        counters.record(1, 1, true);
        assert!(!repo.update_progress(&log.execution_id, &counters).await.unwrap());

        let after = repo.get(&log.execution_id).await.unwrap().unwrap();
        assert_eq!(after.status, ExecutionStatus::Completed);
        assert_eq!(after.end_time, first_end);
        assert!(after.error_message.is_none());
        assert_eq!(after.counters, RunCounters::default());
    }

    #[tokio::test]
    async fn test_finalize_rejects_running() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.execution_logs();

        let log = ExecutionLog::start(None);
        repo.create(&log).await.unwrap();
        let still_running = Finalization {
            status: ExecutionStatus::Running,
            counters: RunCounters::default(),
            error_message: None,
            error_details: None,
        };
        assert!(!repo.finalize(&log.execution_id, &still_running).await.unwrap());
    }

    fn started_minutes_ago(minutes: i64) -> ExecutionLog {
        let mut log = ExecutionLog::start(None);
        log.start_time = Utc::now() - chrono::Duration::minutes(minutes);
        log.heartbeat_at = Some(log.start_time);
        log
    }

    #[tokio::test]
    async fn test_mark_interrupted() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.execution_logs();

        let stale = started_minutes_ago(10);
        repo.create(&stale).await.unwrap();
        let finished = started_minutes_ago(10);
        repo.create(&finished).await.unwrap();
        repo.finalize(&finished.execution_id, &completed(RunCounters::default()))
            .await
            .unwrap();

        assert_eq!(repo.mark_interrupted(stale_before(Utc::now())).await.unwrap(), 1);

        let stale = repo.get(&stale.execution_id).await.unwrap().unwrap();
        assert_eq!(stale.status, ExecutionStatus::Cancelled);
        assert!(stale.end_time.is_some());
        assert_eq!(repo.list_recent(10).await.unwrap().len(), 2);
        assert!(repo.last_finished().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_long_run_alive() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.execution_logs();

        // Started long ago but still reporting in
        let long_run = started_minutes_ago(45);
        repo.create(&long_run).await.unwrap();
        assert!(repo.list_live(stale_before(Utc::now())).await.unwrap().is_empty());
        assert!(repo.touch(&long_run.execution_id).await.unwrap());

        let live = repo.list_live(stale_before(Utc::now())).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(repo.mark_interrupted(stale_before(Utc::now())).await.unwrap(), 0);

        let mut counters = RunCounters::default();
        counters.record(2, 2, true);
        assert!(repo.update_progress(&long_run.execution_id, &counters).await.unwrap());
        assert!(repo.finalize(&long_run.execution_id, &completed(counters)).await.unwrap());
        assert!(!repo.touch(&long_run.execution_id).await.unwrap());
        assert!(repo.list_live(stale_before(Utc::now())).await.unwrap().is_empty());
    }
}
