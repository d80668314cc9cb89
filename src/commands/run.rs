use std::sync::Arc;
use tracing::info;

use crate::commands::{build_job, load_config, open_store};
use crate::error::Result;
use crate::worker::CacheScheduler;

pub async fn run() {
    let config = load_config();

    if let Err(e) = run_scheduler(&config).await {
        eprintln!("❌ Scheduler error: {}", e);
        std::process::exit(1);
    }
}

async fn run_scheduler(config: &crate::models::AppConfig) -> Result<()> {
    let store = open_store(config).await?;

    if !config.scheduler_enabled {
        info!("Scheduler disabled (SCHEDULER_ENABLED=false), nothing to do");
        store.close().await;
        return Ok(());
    }

    let job = Arc::new(build_job(config, store.clone())?);
    let scheduler = Arc::new(CacheScheduler::new(job, config.schedule_hour, config.schedule_minute));

    info!(
        hour = config.schedule_hour,
        minute = config.schedule_minute,
        days_to_keep = config.days_to_keep,
        "Starting VN30 cache scheduler"
    );
    let result = scheduler.run_until_shutdown().await;

    store.close().await;
    result
}
