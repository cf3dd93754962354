//! Service layer for listingscout.
//!
//! Run execution, scheduling and agent notification, independent of the CLI.

pub mod execution_logger;
pub mod executor;
pub mod notifier;
pub mod scheduler;

pub use execution_logger::{log_file_path, read_log_tail, ExecutionLogger};
pub use executor::{ExecutorOptions, RunError, RunExecutor, RunSummary, ScrapeRunner};
pub use notifier::{
    collect_recipients, normalize_phone, notify_agents, DeliveryReport, Notifier, NotifyError,
    NotifySummary, Recipient, TwilioNotifier, TwilioOptions,
};
pub use scheduler::{Scheduler, SchedulerError, SchedulerStatus, ShutdownOutcome, StartOutcome};
