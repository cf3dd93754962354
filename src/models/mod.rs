//! Data models for listingscout.

mod execution;
mod message_template;
mod property;
mod scheduler;
mod search_config;

pub use execution::{
    stale_before, ExecutionLog, ExecutionStatus, RunCounters, HEARTBEAT_INTERVAL,
    HEARTBEAT_STALE_SECS,
};
pub use message_template::{MessageTemplate, TemplateContext, PLACEHOLDERS};
pub use property::{Attribution, Property, ATTRIBUTION_FIELDS};
pub use scheduler::{
    ConfigValidationError, SchedulerConfigUpdate, SchedulerSettings, MAX_INTERVAL_MINUTES,
    MAX_RETRY_ATTEMPTS, MAX_TIMEOUT_MINUTES, MIN_INTERVAL_MINUTES, MIN_TIMEOUT_MINUTES,
};
pub use search_config::{BoundingBox, SearchConfig};
