pub mod rate_limiter;
pub mod scheduler;

pub use rate_limiter::{RateLimiter, RATE_WINDOW};
pub use scheduler::{
    SourceSyncConfig, SyncScheduler, SyncSchedulerBuilder, SyncState, TickOutcome, TickReport,
};
