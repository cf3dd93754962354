//! One scrape run over every active search configuration.
//!
//! Configurations are processed concurrently up to `max_concurrent_workers`.
//! Each one is isolated: a failed search or save is counted and the run moves
//! on. Only a defect in the loop itself fails the run. A run can be
//! cancelled from outside; its log is then finalized as `cancelled`.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};

use super::execution_logger::ExecutionLogger;
use crate::models::{ExecutionStatus, Property, RunCounters, SchedulerSettings, SearchConfig};
use crate::repository::{DieselDbContext, DieselError};
use crate::scrapers::{normalize_listing, ListingSource, RetryPolicy, SourceError};

/// Run-level failure. Per-configuration problems never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Database error: {0}")]
    Database(#[from] DieselError),

    #[error("run panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Internal(String),
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub counters: RunCounters,
    pub duration: Duration,
}

/// Anything that can perform one full run. The scheduler only sees this.
#[async_trait]
pub trait ScrapeRunner: Send + Sync {
    async fn run_once(&self) -> Result<RunSummary, RunError>;

    /// Ask an in-progress run to stop. No effect when idle.
    fn cancel(&self) {}
}

/// Tunables not stored in the scheduler config row.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Detail fetches per configuration per run.
    pub listing_limit: usize,
    /// Concurrent detail fetches within one configuration.
    pub detail_concurrency: usize,
    pub log_dir: PathBuf,
    pub search_policy: RetryPolicy,
    pub detail_policy: RetryPolicy,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            listing_limit: 10,
            detail_concurrency: 3,
            log_dir: PathBuf::from("logs"),
            search_policy: RetryPolicy::search_default(),
            detail_policy: RetryPolicy::detail_default(),
        }
    }
}

/// What one configuration contributed to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConfigOutcome {
    observed: u32,
    saved: u32,
    success: bool,
}

/// Runs the scrape pipeline against a [`ListingSource`].
pub struct RunExecutor {
    db: DieselDbContext,
    source: Arc<dyn ListingSource>,
    options: ExecutorOptions,
    cancel_tx: watch::Sender<bool>,
}

impl RunExecutor {
    pub fn new(db: DieselDbContext, source: Arc<dyn ListingSource>, options: ExecutorOptions) -> Self {
        Self {
            db,
            source,
            options,
            cancel_tx: watch::channel(false).0,
        }
    }

    async fn run_configs(
        &self,
        logger: &ExecutionLogger,
        settings: &SchedulerSettings,
    ) -> Result<(), RunError> {
        let configs = self.db.search_configs().list_active().await?;
        if configs.is_empty() {
            logger.warn("No active search configurations found");
            return Ok(());
        }
        logger.info(&format!(
            "Processing {} search configurations with {} workers",
            configs.len(),
            settings.max_concurrent_workers
        ));

        let workers = usize::try_from(settings.max_concurrent_workers.max(1)).unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        let tasks = configs.iter().map(|config| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| RunError::Internal(e.to_string()))?;
                let outcome = self.process_config(logger, config, settings).await;
                logger
                    .record_config(outcome.observed, outcome.saved, outcome.success)
                    .await;
                Ok::<_, RunError>(())
            }
        });

        for result in join_all(tasks).await {
            result?;
        }
        Ok(())
    }

    async fn process_config(
        &self,
        logger: &ExecutionLogger,
        config: &SearchConfig,
        settings: &SchedulerSettings,
    ) -> ConfigOutcome {
        let term = &config.search_value;
        let timeout = settings.timeout();
        logger.info(&format!("Processing search: {}", term));

        let search_policy = self.options.search_policy.with_max_retries(settings.retry_attempts);
        let label = format!("search '{}'", term);
        let summaries = search_policy
            .run(&label, || async {
                tokio::time::timeout(timeout, self.source.search(config, config.pagination))
                    .await
                    .unwrap_or(Err(SourceError::Timeout(timeout)))
            })
            .await;
        let summaries = match summaries {
            Ok(summaries) => summaries,
            Err(e) => {
                logger.error(&format!("Search failed for '{}': {}", term, e));
                return ConfigOutcome::default();
            }
        };

        let limit = self.options.listing_limit;
        if summaries.len() > limit {
            logger.info(&format!(
                "'{}' returned {} listings, fetching details for the first {}",
                term,
                summaries.len(),
                limit
            ));
        }

        let detail_phase = futures::stream::iter(summaries.into_iter().take(limit))
            .map(|summary| async move {
                let label = format!("detail {}", summary.locator);
                let detail = self
                    .options
                    .detail_policy
                    .run(&label, || self.source.fetch_detail(&summary.locator))
                    .await;
                (summary, detail)
            })
            .buffered(self.options.detail_concurrency.max(1))
            .collect::<Vec<_>>();

        let fetched = match tokio::time::timeout(timeout, detail_phase).await {
            Ok(fetched) => fetched,
            Err(_) => {
                logger.error(&format!(
                    "Detail fetch for '{}' exceeded {} minutes",
                    term, settings.timeout_minutes
                ));
                return ConfigOutcome::default();
            }
        };

        let mut records: Vec<Property> = Vec::with_capacity(fetched.len());
        for (summary, detail) in fetched {
            match detail {
                Ok(detail) => records.push(normalize_listing(config, &summary, &detail)),
                Err(e) => logger.warn(&format!(
                    "Dropping listing {} ({}): {}",
                    summary.address, summary.locator, e
                )),
            }
        }

        let observed = u32::try_from(records.len()).unwrap_or(u32::MAX);
        logger.info(&format!("Found {} properties for '{}'", observed, term));
        if records.is_empty() {
            return ConfigOutcome {
                observed: 0,
                saved: 0,
                success: true,
            };
        }

        match self.db.properties().replace_for_search_term(term, &records).await {
            Ok(saved) => {
                logger.info(&format!("Saved {} properties for '{}'", saved, term));
                ConfigOutcome {
                    observed,
                    saved: u32::try_from(saved).unwrap_or(u32::MAX),
                    success: true,
                }
            }
            Err(e) => {
                logger.error(&format!(
                    "Database error while saving '{}', prior records kept: {}",
                    term, e
                ));
                ConfigOutcome {
                    observed,
                    saved: 0,
                    success: false,
                }
            }
        }
    }
}

/// Resolves once the flag is set.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        let set = *rx.borrow_and_update();
        if set {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[async_trait]
impl ScrapeRunner for RunExecutor {
    async fn run_once(&self) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        self.cancel_tx.send_replace(false);
        let cancel_rx = self.cancel_tx.subscribe();

        let settings = self.db.scheduler_config().get_or_create().await?;
        let logger = ExecutionLogger::start(self.db.execution_logs(), &self.options.log_dir).await?;
        let _heartbeat = logger.spawn_heartbeat();

        let run = AssertUnwindSafe(self.run_configs(&logger, &settings)).catch_unwind();
        let outcome = tokio::select! {
            outcome = run => Some(outcome),
            _ = cancelled(cancel_rx) => None,
        };

        let Some(outcome) = outcome else {
            if let Err(e) = logger.cancel("run cancelled before completion").await {
                logger.error(&format!("Could not record cancellation: {}", e));
            }
            return Ok(RunSummary {
                execution_id: logger.execution_id().to_string(),
                status: ExecutionStatus::Cancelled,
                counters: logger.counters().await,
                duration: started.elapsed(),
            });
        };

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some((e.to_string(), format!("{:?}", e), e)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let err = RunError::Panicked(message.clone());
                Some((err.to_string(), message, err))
            }
        };

        match failure {
            None => {
                let status = if logger.complete_success().await? {
                    ExecutionStatus::Completed
                } else {
                    logger
                        .stored_status()
                        .await?
                        .unwrap_or(ExecutionStatus::Completed)
                };
                Ok(RunSummary {
                    execution_id: logger.execution_id().to_string(),
                    status,
                    counters: logger.counters().await,
                    duration: started.elapsed(),
                })
            }
            Some((message, details, err)) => {
                if let Err(db_err) = logger.complete_failure(&message, Some(&details)).await {
                    logger.error(&format!("Could not record failure: {}", db_err));
                }
                Err(err)
            }
        }
    }

    fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }
}
