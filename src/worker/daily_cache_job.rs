use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::constants::VN30_INDEX_SYMBOL;
use crate::error::Result;
use crate::services::{MarketOverviewAggregator, MarketStore, QuoteProvider, RetentionReport};
use crate::utils::market_date;

/// Summary of one successful cache cycle
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub date: NaiveDate,
    /// Records written, index pseudo-record included
    pub stocks_saved: usize,
    /// Constituents fetched successfully
    pub total_stocks: usize,
    /// An overview for `date` existed before this run
    pub replaced_existing: bool,
    /// `None` when the retention sweep failed
    pub retention: Option<RetentionReport>,
}

/// Fetch, persist and prune the daily market cache
pub struct DailyCacheJob<P: ?Sized> {
    aggregator: MarketOverviewAggregator<P>,
    store: Arc<MarketStore>,
    days_to_keep: u32,
}

impl<P: QuoteProvider + ?Sized> DailyCacheJob<P> {
    pub fn new(aggregator: MarketOverviewAggregator<P>, store: Arc<MarketStore>, days_to_keep: u32) -> Self {
        Self {
            aggregator,
            store,
            days_to_keep,
        }
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    pub async fn run(&self) -> Result<JobOutcome> {
        self.run_at(Utc::now()).await
    }

    /// One cache cycle as of `now`
    ///
    /// Writes are not rolled back when a later step fails; the next run
    /// overwrites them.
    #[instrument(skip(self), fields(days_to_keep = self.days_to_keep))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobOutcome> {
        info!("Daily cache job: Starting");

        let snapshot = step("aggregate", self.aggregator.fetch_market_overview_at(now).await.map_err(Into::into))?;
        let date = snapshot.date();

        let replaced_existing = step("check existing", self.store.has_market_data(date).await)?;
        if replaced_existing {
            info!(date = %date, "Data already cached for date, updating");
        } else {
            info!(date = %date, "Caching new data for date");
        }

        step("save overview", self.store.save_market_overview(&snapshot.overview).await)?;
        let stocks_saved = step("save stocks", self.store.save_stock_records(&snapshot.stocks).await)?;

        // Supplementary data; a failure here does not fail the cycle
        if let Err(e) = self
            .store
            .save_intraday_candles(VN30_INDEX_SYMBOL, &snapshot.index_intraday)
            .await
        {
            warn!(error = %e, "Daily cache job: Failed to save index intraday candles");
        }

        let retention = match self.store.delete_old_data(self.days_to_keep, market_date(now)).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Daily cache job: Retention sweep failed");
                None
            }
        };

        let overview = &snapshot.overview;
        info!(
            date = %date,
            vn30_index = overview.vn30_index.index,
            total_stocks = overview.total_stocks,
            stocks_saved,
            "Daily cache job: Completed"
        );
        if let Some(top) = overview.top_gainers.first() {
            info!(symbol = %top.symbol, change_percent = top.change_percent, "Top gainer");
        }
        if let Some(top) = overview.top_losers.first() {
            info!(symbol = %top.symbol, change_percent = top.change_percent, "Top loser");
        }

        Ok(JobOutcome {
            date,
            stocks_saved,
            total_stocks: overview.total_stocks,
            replaced_existing,
            retention,
        })
    }
}

/// Log a failed step by name and pass the result through
fn step<T>(name: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!(step = name, error = %e, "Daily cache job: Failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::fake::{daily_bars, minute_bars, FakeProvider};
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> Arc<MarketStore> {
        let url = format!("sqlite://{}", dir.path().join("cache.db").display());
        Arc::new(MarketStore::connect(&url, 1, 2).await.unwrap())
    }

    fn last_session() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap()
    }

    fn provider() -> FakeProvider {
        let session = Utc.with_ymd_and_hms(2025, 3, 14, 2, 0, 0).unwrap();
        FakeProvider::new()
            .with_daily("VN30", daily_bars(last_session(), &[1250.50, 1255.75]))
            .with_minutes("VN30", minute_bars(session, 15, 1251.0))
            .with_daily("ACB", daily_bars(last_session(), &[24.0, 24.5]))
            .with_daily("FPT", daily_bars(last_session(), &[120.0, 118.8]))
    }

    #[tokio::test]
    async fn test_cycle_persists_and_reruns_idempotently() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let aggregator = MarketOverviewAggregator::new(Arc::new(provider()), 1000.0, Duration::ZERO)
            .with_symbols(&["ACB", "FPT"]);
        let job = DailyCacheJob::new(aggregator, store.clone(), 30);
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();

        let first = job.run_at(now).await.unwrap();
        assert_eq!(first.date, last_session().date_naive());
        assert_eq!(first.stocks_saved, 3);
        assert_eq!(first.total_stocks, 2);
        assert!(!first.replaced_existing);
        assert!(first.retention.is_some());

        let second = job.run_at(now).await.unwrap();
        assert!(second.replaced_existing);

        let stocks = store.get_all_stocks_by_date(first.date).await.unwrap();
        assert_eq!(stocks.len(), 3);
        assert_eq!(store.get_available_dates(10).await.unwrap().len(), 1);
        assert_eq!(store.get_intraday_candles("VN30", 100).await.unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_failed_aggregation_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let aggregator = MarketOverviewAggregator::new(Arc::new(FakeProvider::new()), 1000.0, Duration::ZERO)
            .with_symbols(&["ACB"]);
        let job = DailyCacheJob::new(aggregator, store.clone(), 30);

        let err = job.run().await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Aggregation(_)));
        assert!(store.get_latest_market_overview().await.unwrap().is_none());
    }
}
