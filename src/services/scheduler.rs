//! Periodic run scheduling.
//!
//! One background loop per process polls the persisted config and starts a
//! run when it is due. A single atomic flag guards against overlapping runs:
//! scheduled ticks that find it set are skipped, `run_now` reports
//! [`SchedulerError::AlreadyRunning`]. The next run is always measured from
//! the previous run's completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::executor::{RunError, RunSummary, ScrapeRunner};
use crate::models::{
    stale_before, ConfigValidationError, SchedulerConfigUpdate, SchedulerSettings,
};
use crate::repository::{DieselDbContext, DieselError};

/// How long `stop` waits for the loop task to exit.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `shutdown` waits for a cancelled run to wind down.
const CANCEL_WAIT: Duration = Duration::from_secs(5);
const CANCEL_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a scraper run is already in progress")]
    AlreadyRunning,

    #[error("invalid configuration: {0}")]
    Validation(#[from] ConfigValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("run failed: {0}")]
    Run(#[from] RunError),
}

/// Result of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Point-in-time scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the timer loop is active in this process.
    pub is_running: bool,
    pub run_in_flight: bool,
    pub is_enabled: bool,
    pub schedule_interval_minutes: u32,
    pub last_scheduled_run: Option<DateTime<Utc>>,
    pub next_scheduled_run: Option<DateTime<Utc>>,
}

/// What `shutdown` did with the in-flight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// No run was in flight.
    Idle,
    /// The run finished within the grace period.
    Finished,
    /// The run was cancelled and has ended.
    Cancelled,
    /// The run ignored cancellation; its log is closed out by the next start.
    StillRunning,
}

struct SchedulerInner {
    db: DieselDbContext,
    runner: Arc<dyn ScrapeRunner>,
    in_flight: AtomicBool,
    loop_active: AtomicBool,
    /// Woken whenever a run releases the in-flight flag.
    idle: Notify,
}

/// Clears the in-flight flag when the run ends, however it ends.
struct InFlightGuard {
    inner: Arc<SchedulerInner>,
}

impl InFlightGuard {
    fn acquire(inner: &Arc<SchedulerInner>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: inner.clone(),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
        self.inner.idle.notify_waiters();
    }
}

impl SchedulerInner {
    /// Run once while holding the in-flight guard, then reschedule.
    async fn execute(&self, _guard: InFlightGuard) -> Result<RunSummary, RunError> {
        let started = Utc::now();
        let result = self.runner.run_once().await;
        let finished = Utc::now();

        match &result {
            Ok(summary) => info!(
                "Run {} {}: {}/{} searches, {} properties saved",
                summary.execution_id,
                summary.status.as_str(),
                summary.counters.successful_searches,
                summary.counters.total_searches,
                summary.counters.properties_saved
            ),
            Err(e) => error!("Scraper run failed: {}", e),
        }

        if let Err(e) = self.reschedule(started, finished).await {
            warn!("Failed to record next run time: {}", e);
        }
        result
    }

    async fn reschedule(
        &self,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) -> Result<(), DieselError> {
        let mut settings = self.db.scheduler_config().get_or_create().await?;
        settings.last_scheduled_run = Some(started);
        settings.next_scheduled_run = settings.next_run_after(finished);
        self.db
            .scheduler_config()
            .set_run_times(settings.last_scheduled_run, settings.next_scheduled_run)
            .await
    }

    /// One timer tick: reload config, start a run in the background if due.
    async fn tick(self: &Arc<Self>) {
        let settings = match self.db.scheduler_config().get_or_create().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Scheduler could not load config: {}", e);
                return;
            }
        };
        if !settings.is_due(Utc::now()) {
            return;
        }

        let Some(guard) = InFlightGuard::acquire(self) else {
            debug!("Scheduled run skipped: previous run still in flight");
            return;
        };
        let inner = self.clone();
        tokio::spawn(async move {
            let _ = inner.execute(guard).await;
        });
    }

    fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no run is in flight. False if `limit` passed first.
    async fn wait_idle(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, async {
            loop {
                let released = self.idle.notified();
                if !self.is_in_flight() {
                    return;
                }
                released.await;
            }
        })
        .await
        .is_ok()
    }
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Drives [`ScrapeRunner`] on the configured interval.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    poll_interval: Duration,
    handle: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    /// `poll_interval` is how often the loop checks whether a run is due.
    pub fn new(db: DieselDbContext, runner: Arc<dyn ScrapeRunner>, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                db,
                runner,
                in_flight: AtomicBool::new(false),
                loop_active: AtomicBool::new(false),
                idle: Notify::new(),
            }),
            poll_interval,
            handle: Mutex::new(None),
        }
    }

    /// Start the timer loop. Starting twice reports `AlreadyRunning`.
    ///
    /// Runs left `running` by a dead process (stale heartbeat) are closed
    /// out as cancelled; runs still alive elsewhere are left alone.
    pub async fn start(&self) -> Result<StartOutcome, SchedulerError> {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            info!("Scheduler already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let now = Utc::now();
        let closed = self
            .inner
            .db
            .execution_logs()
            .mark_interrupted(stale_before(now))
            .await?;
        if closed > 0 {
            warn!("Marked {} interrupted run(s) as cancelled", closed);
        }

        let mut settings = self.inner.db.scheduler_config().get_or_create().await?;
        if settings.next_scheduled_run.map_or(true, |next| next < now) {
            settings.next_scheduled_run = settings.next_run_after(now);
            self.inner
                .db
                .scheduler_config()
                .set_run_times(settings.last_scheduled_run, settings.next_scheduled_run)
                .await?;
        }
        info!(
            "Scheduler started: every {} minutes, next run {}",
            settings.schedule_interval_minutes,
            settings
                .next_scheduled_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "disabled".to_string())
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let poll = self.poll_interval;
        inner.loop_active.store(true, Ordering::Release);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(poll) => inner.tick().await,
                }
            }
            inner.loop_active.store(false, Ordering::Release);
            debug!("Scheduler loop exited");
        });

        *handle = Some(LoopHandle { shutdown, task });
        Ok(StartOutcome::Started)
    }

    /// Stop the timer loop. An in-flight run is left to finish.
    ///
    /// Returns false if the loop wasn't running.
    pub async fn stop(&self) -> bool {
        let Some(LoopHandle { shutdown, task }) = self.handle.lock().await.take() else {
            return false;
        };
        let _ = shutdown.send(true);
        if tokio::time::timeout(STOP_JOIN_TIMEOUT, task).await.is_err() {
            warn!(
                "Scheduler loop did not exit within {:?}",
                STOP_JOIN_TIMEOUT
            );
        }
        self.inner.loop_active.store(false, Ordering::Release);
        info!("Scheduler stopped");
        true
    }

    /// Stop the loop, give an in-flight run `grace` to finish, then cancel
    /// it so its log is finalized before the process exits.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.stop().await;
        if !self.inner.is_in_flight() {
            return ShutdownOutcome::Idle;
        }

        info!("Waiting up to {:?} for the in-flight run", grace);
        if self.inner.wait_idle(grace).await {
            return ShutdownOutcome::Finished;
        }

        warn!("Run still in flight after {:?}; cancelling", grace);
        let deadline = tokio::time::Instant::now() + CANCEL_WAIT;
        while self.inner.is_in_flight() && tokio::time::Instant::now() < deadline {
            // Repeated in case the run had not yet armed its cancel signal
            self.inner.runner.cancel();
            self.inner.wait_idle(CANCEL_RETRY).await;
        }
        if self.inner.is_in_flight() {
            ShutdownOutcome::StillRunning
        } else {
            ShutdownOutcome::Cancelled
        }
    }

    /// Run immediately, in the caller's task.
    pub async fn run_now(&self) -> Result<RunSummary, SchedulerError> {
        let guard = InFlightGuard::acquire(&self.inner).ok_or(SchedulerError::AlreadyRunning)?;
        Ok(self.inner.execute(guard).await?)
    }

    /// Validate and persist a partial config update, recomputing the next run.
    ///
    /// Nothing is written if validation fails.
    pub async fn update_config(
        &self,
        update: &SchedulerConfigUpdate,
    ) -> Result<SchedulerSettings, SchedulerError> {
        update.validate()?;
        let current = self.inner.db.scheduler_config().get_or_create().await?;
        let mut next = update.apply(&current)?;
        next.next_scheduled_run = next.next_run_after(Utc::now());
        self.inner.db.scheduler_config().save(&next).await?;
        info!("Scheduler config updated: {:?}", update);
        Ok(next)
    }

    /// Current state, with the schedule read from the database.
    ///
    /// Never waits on a run or on `start`/`stop`.
    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let settings = self.inner.db.scheduler_config().get_or_create().await?;
        Ok(SchedulerStatus {
            is_running: self.inner.loop_active.load(Ordering::Acquire),
            run_in_flight: self.inner.is_in_flight(),
            is_enabled: settings.is_enabled,
            schedule_interval_minutes: settings.schedule_interval_minutes,
            last_scheduled_run: settings.last_scheduled_run,
            next_scheduled_run: settings.next_scheduled_run,
        })
    }

    pub fn is_run_in_flight(&self) -> bool {
        self.inner.is_in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionLog, ExecutionStatus, RunCounters};
    use crate::repository::test_support::setup_test_db;
    use async_trait::async_trait;
    use crate::services::ExecutionLogger;
    use std::sync::atomic::AtomicU32;

    /// Runner that blocks until released or cancelled and tracks overlap.
    #[derive(Default)]
    struct GatedRunner {
        release: Notify,
        cancel_signal: Notify,
        gated: bool,
        active: AtomicU32,
        max_active: AtomicU32,
        calls: AtomicU32,
        hold: Duration,
    }

    #[async_trait]
    impl ScrapeRunner for GatedRunner {
        async fn run_once(&self) -> Result<RunSummary, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            let mut status = ExecutionStatus::Completed;
            if self.gated {
                tokio::select! {
                    _ = self.release.notified() => {}
                    _ = self.cancel_signal.notified() => status = ExecutionStatus::Cancelled,
                }
            }
            tokio::time::sleep(self.hold).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(RunSummary {
                execution_id: "test".to_string(),
                status,
                counters: RunCounters::default(),
                duration: self.hold,
            })
        }

        fn cancel(&self) {
            self.cancel_signal.notify_one();
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_run_now_rejects_overlap() {
        let (ctx, _dir) = setup_test_db().await;
        let runner = Arc::new(GatedRunner {
            gated: true,
            ..Default::default()
        });
        let scheduler = Arc::new(Scheduler::new(ctx, runner.clone(), Duration::from_secs(60)));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_now().await })
        };
        wait_until(|| scheduler.is_run_in_flight()).await;

        assert!(matches!(
            scheduler.run_now().await,
            Err(SchedulerError::AlreadyRunning)
        ));
        assert!(scheduler.status().await.unwrap().run_in_flight);

        runner.release.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert!(!scheduler.is_run_in_flight());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        // Next run measured from completion
        let status = scheduler.status().await.unwrap();
        let next = status.next_scheduled_run.unwrap();
        let last = status.last_scheduled_run.unwrap();
        assert!(next - last >= chrono::Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (ctx, _dir) = setup_test_db().await;
        let scheduler = Scheduler::new(ctx, Arc::new(GatedRunner::default()), Duration::from_secs(60));

        assert_eq!(scheduler.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(scheduler.start().await.unwrap(), StartOutcome::AlreadyRunning);
        assert!(scheduler.status().await.unwrap().is_running);
        assert!(scheduler.status().await.unwrap().next_scheduled_run.is_some());

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        assert!(!scheduler.status().await.unwrap().is_running);
    }

    #[tokio::test]
    async fn test_due_run_fires_once_without_overlap() {
        let (ctx, _dir) = setup_test_db().await;
        ctx.scheduler_config().get_or_create().await.unwrap();
        let runner = Arc::new(GatedRunner {
            hold: Duration::from_millis(100),
            ..Default::default()
        });
        let scheduler = Scheduler::new(ctx.clone(), runner.clone(), Duration::from_millis(10));
        scheduler.start().await.unwrap();

        // Make the run due immediately; ticks keep firing while it runs
        ctx.scheduler_config()
            .set_run_times(None, Some(Utc::now() - chrono::Duration::seconds(1)))
            .await
            .unwrap();

        wait_until(|| runner.calls.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.stop().await;

        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.max_active.load(Ordering::SeqCst), 1);

        let settings = ctx.scheduler_config().get_or_create().await.unwrap();
        assert!(settings.last_scheduled_run.is_some());
        assert!(settings.next_scheduled_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_invalid_update_changes_nothing() {
        let (ctx, _dir) = setup_test_db().await;
        let scheduler = Scheduler::new(ctx.clone(), Arc::new(GatedRunner::default()), Duration::from_secs(60));

        let bad = SchedulerConfigUpdate {
            schedule_interval_minutes: Some(30),
            timeout_minutes: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            scheduler.update_config(&bad).await,
            Err(SchedulerError::Validation(ConfigValidationError::Timeout(500)))
        ));
        let stored = ctx.scheduler_config().get_or_create().await.unwrap();
        assert_eq!(stored.schedule_interval_minutes, 10);

        let good = SchedulerConfigUpdate {
            schedule_interval_minutes: Some(30),
            ..Default::default()
        };
        let updated = scheduler.update_config(&good).await.unwrap();
        assert_eq!(updated.schedule_interval_minutes, 30);
        assert!(updated.next_scheduled_run.is_some());
        assert_eq!(
            ctx.scheduler_config().get_or_create().await.unwrap().schedule_interval_minutes,
            30
        );
    }

    #[tokio::test]
    async fn test_disabling_clears_next_run() {
        let (ctx, _dir) = setup_test_db().await;
        let scheduler = Scheduler::new(ctx, Arc::new(GatedRunner::default()), Duration::from_secs(60));
        let updated = scheduler
            .update_config(&SchedulerConfigUpdate {
                is_enabled: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated.next_scheduled_run.is_none());
    }

    #[tokio::test]
    async fn test_start_cancels_orphaned_runs() {
        let (ctx, _dir) = setup_test_db().await;
        let mut orphan = ExecutionLog::start(None);
        orphan.start_time = Utc::now() - chrono::Duration::minutes(30);
        orphan.heartbeat_at = Some(orphan.start_time);
        ctx.execution_logs().create(&orphan).await.unwrap();

        let scheduler = Scheduler::new(ctx.clone(), Arc::new(GatedRunner::default()), Duration::from_secs(60));
        scheduler.start().await.unwrap();
        scheduler.stop().await;

        let log = ctx.execution_logs().get(&orphan.execution_id).await.unwrap().unwrap();
        assert_eq!(log.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_start_leaves_live_run_in_other_process_alone() {
        let (ctx, dir) = setup_test_db().await;
        let live = ExecutionLogger::start(ctx.execution_logs(), dir.path())
            .await
            .unwrap();

        let scheduler = Scheduler::new(ctx.clone(), Arc::new(GatedRunner::default()), Duration::from_secs(60));
        scheduler.start().await.unwrap();
        scheduler.stop().await;

        live.record_config(2, 2, true).await;
        assert!(live.complete_success().await.unwrap());
        let log = ctx.execution_logs().get(live.execution_id()).await.unwrap().unwrap();
        assert_eq!(log.status, ExecutionStatus::Completed);
        assert_eq!(log.counters.properties_saved, 2);
        assert!(log.error_message.is_none());
    }

    #[tokio::test]
    async fn test_status_reads_persisted_schedule_before_start() {
        let (ctx, _dir) = setup_test_db().await;
        let scheduler = Scheduler::new(ctx.clone(), Arc::new(GatedRunner::default()), Duration::from_secs(60));
        scheduler
            .update_config(&SchedulerConfigUpdate {
                schedule_interval_minutes: Some(45),
                ..Default::default()
            })
            .await
            .unwrap();

        // A second instance, as another command would build it
        let fresh = Scheduler::new(ctx, Arc::new(GatedRunner::default()), Duration::from_secs(60));
        let status = fresh.status().await.unwrap();
        assert!(!status.is_running);
        assert!(!status.run_in_flight);
        assert_eq!(status.schedule_interval_minutes, 45);
        assert!(status.next_scheduled_run.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_idle_and_finished() {
        let (ctx, _dir) = setup_test_db().await;
        let scheduler = Scheduler::new(ctx.clone(), Arc::new(GatedRunner::default()), Duration::from_secs(60));
        scheduler.start().await.unwrap();
        assert_eq!(
            scheduler.shutdown(Duration::from_millis(50)).await,
            ShutdownOutcome::Idle
        );

        let runner = Arc::new(GatedRunner {
            hold: Duration::from_millis(50),
            ..Default::default()
        });
        let scheduler = Arc::new(Scheduler::new(ctx, runner.clone(), Duration::from_secs(60)));
        let run = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_now().await })
        };
        wait_until(|| scheduler.is_run_in_flight()).await;
        assert_eq!(
            scheduler.shutdown(Duration::from_secs(5)).await,
            ShutdownOutcome::Finished
        );
        assert_eq!(run.await.unwrap().unwrap().status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_stuck_run() {
        let (ctx, _dir) = setup_test_db().await;
        let runner = Arc::new(GatedRunner {
            gated: true,
            ..Default::default()
        });
        let scheduler = Arc::new(Scheduler::new(ctx, runner.clone(), Duration::from_secs(60)));
        let run = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_now().await })
        };
        wait_until(|| scheduler.is_run_in_flight()).await;

        assert_eq!(
            scheduler.shutdown(Duration::from_millis(20)).await,
            ShutdownOutcome::Cancelled
        );
        assert!(!scheduler.is_run_in_flight());
        assert_eq!(run.await.unwrap().unwrap().status, ExecutionStatus::Cancelled);
    }
}
