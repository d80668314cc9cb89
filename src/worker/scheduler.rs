//! Daily trigger for the cache job
//!
//! A cron job in Asia/Ho_Chi_Minh time plus a one-off startup run when
//! today's overview is missing. An atomic flag keeps at most one cycle in
//! flight; triggers that arrive while a cycle runs are skipped.

use chrono_tz::Asia::Ho_Chi_Minh;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_cron_scheduler::{JobBuilder, JobScheduler};
use tracing::{error, info, instrument, warn};

use crate::constants::MARKET_TIMEZONE;
use crate::error::Result;
use crate::services::QuoteProvider;
use crate::utils::market_today;
use crate::worker::daily_cache_job::{DailyCacheJob, JobOutcome};

/// Six-field cron expression (with seconds) firing daily at `hour:minute`
pub fn cron_expression(hour: u32, minute: u32) -> String {
    format!("0 {} {} * * *", minute, hour)
}

/// Holds the running flag for one cycle and clears it on drop
struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct CacheScheduler<P: ?Sized> {
    job: Arc<DailyCacheJob<P>>,
    running: Arc<AtomicBool>,
    hour: u32,
    minute: u32,
}

impl<P: QuoteProvider + ?Sized + 'static> CacheScheduler<P> {
    pub fn new(job: Arc<DailyCacheJob<P>>, hour: u32, minute: u32) -> Self {
        Self {
            job,
            running: Arc::new(AtomicBool::new(false)),
            hour,
            minute,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cycle unless another is in flight. `None` means skipped.
    pub async fn trigger(&self, reason: &'static str) -> Option<Result<JobOutcome>> {
        run_guarded(self.job.clone(), self.running.clone(), reason).await
    }

    /// Run a cycle when no overview exists for today's local date.
    /// Returns whether a cycle ran.
    pub async fn run_startup_check(&self) -> Result<bool> {
        let today = market_today();
        if self.job.store().has_market_data(today).await? {
            info!(date = %today, "Scheduler: Data for today already cached, skipping startup run");
            return Ok(false);
        }

        info!(date = %today, "Scheduler: No data for today, running startup cycle");
        Ok(self.trigger("startup").await.is_some())
    }

    /// Register the daily cron job and start the scheduler
    #[instrument(skip(self), fields(hour = self.hour, minute = self.minute))]
    pub async fn start(&self) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let schedule = cron_expression(self.hour, self.minute);

        let job = self.job.clone();
        let running = self.running.clone();
        let cron_job = JobBuilder::new()
            .with_timezone(Ho_Chi_Minh)
            .with_cron_job_type()
            .with_schedule(schedule.as_str())?
            .with_run_async(Box::new(move |_uuid, _l| {
                let job = job.clone();
                let running = running.clone();
                Box::pin(async move {
                    run_guarded(job, running, "cron").await;
                })
            }))
            .build()?;

        scheduler.add(cron_job).await?;
        scheduler.start().await?;

        info!(
            schedule = %schedule,
            timezone = MARKET_TIMEZONE,
            "Scheduler: Daily cache job registered"
        );
        Ok(scheduler)
    }

    /// Start the cron job, kick off the startup check and block until Ctrl-C
    pub async fn run_until_shutdown(self: Arc<Self>) -> Result<()> {
        let mut scheduler = self.start().await?;

        let startup = self.clone();
        tokio::spawn(async move {
            if let Err(e) = startup.run_startup_check().await {
                error!(error = %e, "Scheduler: Startup check failed");
            }
        });

        info!("Scheduler: Running, press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Scheduler: Failed to listen for Ctrl-C, shutting down");
        }

        info!("Scheduler: Shutting down");
        scheduler.shutdown().await?;
        Ok(())
    }
}

async fn run_guarded<P>(
    job: Arc<DailyCacheJob<P>>,
    running: Arc<AtomicBool>,
    reason: &'static str,
) -> Option<Result<JobOutcome>>
where
    P: QuoteProvider + ?Sized,
{
    let Some(_guard) = RunningGuard::acquire(&running) else {
        warn!(reason, "Scheduler: Previous cycle still running, skipping trigger");
        return None;
    };

    info!(reason, "Scheduler: Cycle started");
    let result = job.run().await;
    match &result {
        Ok(outcome) => info!(
            reason,
            date = %outcome.date,
            stocks_saved = outcome.stocks_saved,
            "Scheduler: Cycle finished"
        ),
        Err(e) => error!(reason, error = %e, "Scheduler: Cycle failed"),
    }
    Some(result)
}
