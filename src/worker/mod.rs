pub mod daily_cache_job;
pub mod scheduler;

pub use daily_cache_job::{DailyCacheJob, JobOutcome};
pub use scheduler::{cron_expression, CacheScheduler};
