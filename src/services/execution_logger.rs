//! Per-execution logging.
//!
//! Each run gets a database row in `scraper_logs` and an append-only text
//! file at `<log_dir>/scraper_<execution_id>.log`. Messages go to the file
//! and to `tracing`; counters and the terminal status go to the row.
//!
//! While a run is active its row's heartbeat is refreshed every
//! [`HEARTBEAT_INTERVAL`], so other processes can tell a live run from one
//! whose process died.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Local;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{ExecutionLog, ExecutionStatus, RunCounters, HEARTBEAT_INTERVAL};
use crate::repository::diesel_execution_log::Finalization;
use crate::repository::{DieselError, DieselExecutionLogRepository};

/// Log artifact path for an execution.
pub fn log_file_path(log_dir: &Path, execution_id: &str) -> PathBuf {
    log_dir.join(format!("scraper_{}.log", execution_id))
}

/// Last `max_lines` lines of a log artifact.
pub fn read_log_tail(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let skip = lines.len().saturating_sub(max_lines);
    Ok(lines.into_iter().skip(skip).collect())
}

#[derive(Clone, Copy)]
enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

/// Stops the heartbeat task when dropped.
pub struct Heartbeat {
    task: JoinHandle<()>,
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Logger bound to one execution.
pub struct ExecutionLogger {
    execution_id: String,
    log_path: PathBuf,
    file: Mutex<Option<File>>,
    /// Held across the fold and the write so rows never go backwards.
    counters: tokio::sync::Mutex<RunCounters>,
    finished: AtomicBool,
    repo: DieselExecutionLogRepository,
}

impl ExecutionLogger {
    /// Create the `running` row and open the log file.
    ///
    /// A log file that can't be opened is reported and skipped; the row is
    /// still written.
    pub async fn start(
        repo: DieselExecutionLogRepository,
        log_dir: &Path,
    ) -> Result<Self, DieselError> {
        let mut log = ExecutionLog::start(None);
        let log_path = log_file_path(log_dir, &log.execution_id);

        let file = std::fs::create_dir_all(log_dir)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));
        let file = match file {
            Ok(file) => {
                log.log_file_path = Some(log_path.display().to_string());
                Some(file)
            }
            Err(e) => {
                warn!("Cannot open execution log {}: {}", log_path.display(), e);
                None
            }
        };

        repo.create(&log).await?;

        let logger = Self {
            execution_id: log.execution_id,
            log_path,
            file: Mutex::new(file),
            counters: tokio::sync::Mutex::new(RunCounters::default()),
            finished: AtomicBool::new(false),
            repo,
        };
        logger.info(&format!(
            "Scraper execution started with ID: {}",
            logger.execution_id
        ));
        Ok(logger)
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Snapshot of the running totals.
    pub async fn counters(&self) -> RunCounters {
        *self.counters.lock().await
    }

    /// Refresh the row's heartbeat in the background until the returned
    /// handle is dropped.
    pub fn spawn_heartbeat(&self) -> Heartbeat {
        let repo = self.repo.clone();
        let execution_id = self.execution_id.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            // First tick completes immediately; the row was just written
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match repo.touch(&execution_id).await {
                    Ok(true) => debug!("Heartbeat for {}", execution_id),
                    Ok(false) => break,
                    Err(e) => warn!("Heartbeat for {} failed: {}", execution_id, e),
                }
            }
        });
        Heartbeat { task }
    }

    pub fn info(&self, message: &str) {
        info!(execution_id = %self.execution_id, "{}", message);
        self.write_line(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        warn!(execution_id = %self.execution_id, "{}", message);
        self.write_line(Level::Warning, message);
    }

    pub fn error(&self, message: &str) {
        error!(execution_id = %self.execution_id, "{}", message);
        self.write_line(Level::Error, message);
    }

    fn write_line(&self, level: Level, message: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if let Some(file) = guard.as_mut() {
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            // Artifact writes are best-effort; tracing already has the line
            let _ = writeln!(file, "{} - {} - {}", stamp, level.as_str(), message);
        }
    }

    /// Fold one configuration's outcome into the totals and persist them.
    pub async fn record_config(&self, observed: u32, saved: u32, success: bool) -> RunCounters {
        let mut counters = self.counters.lock().await;
        counters.record(observed, saved, success);
        let snapshot = *counters;
        if let Err(e) = self.repo.update_progress(&self.execution_id, &snapshot).await {
            self.warn(&format!("Failed to persist progress: {}", e));
        }
        snapshot
    }

    /// Finalize as `completed` with the current totals.
    pub async fn complete_success(&self) -> Result<bool, DieselError> {
        let counters = self.counters().await;
        self.info(&format!(
            "Scraper completed successfully. Searches: {}/{}, Properties: {}/{}",
            counters.successful_searches,
            counters.total_searches,
            counters.properties_saved,
            counters.total_properties
        ));
        self.finish(ExecutionStatus::Completed, None, None).await
    }

    /// Finalize as `failed`.
    pub async fn complete_failure(
        &self,
        message: &str,
        details: Option<&str>,
    ) -> Result<bool, DieselError> {
        self.error(&format!("Scraper failed: {}", message));
        if let Some(details) = details {
            self.error(&format!("Error details: {}", details));
        }
        self.finish(ExecutionStatus::Failed, Some(message), details).await
    }

    /// Finalize as `cancelled`, e.g. when the process is shutting down.
    pub async fn cancel(&self, reason: &str) -> Result<bool, DieselError> {
        self.warn(&format!("Scraper execution cancelled: {}", reason));
        self.finish(ExecutionStatus::Cancelled, Some(reason), None).await
    }

    /// Status as stored, which differs from ours when another process
    /// finalized the row first.
    pub async fn stored_status(&self) -> Result<Option<ExecutionStatus>, DieselError> {
        Ok(self.repo.get(&self.execution_id).await?.map(|log| log.status))
    }

    /// Only the first call reaches the database.
    async fn finish(
        &self,
        status: ExecutionStatus,
        error_message: Option<&str>,
        error_details: Option<&str>,
    ) -> Result<bool, DieselError> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        // Waits for an in-progress write so the final totals include it
        let counters = self.counters.lock().await;
        let outcome = Finalization {
            status,
            counters: *counters,
            error_message,
            error_details,
        };
        let written = self.repo.finalize(&self.execution_id, &outcome).await?;
        drop(counters);
        if !written {
            self.warn("Execution was already finalized elsewhere; outcome not recorded");
        }
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
            *guard = None;
        }
        Ok(written)
    }
}
