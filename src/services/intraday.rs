//! Intraday (1-minute) candle fetching
//!
//! The provider only pages backward from a `to` cursor, so one trading day
//! is assembled from a few overlapping pages and then cut down to a single
//! local calendar date.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::constants::{INTRADAY_PAGES_LATEST, INTRADAY_PAGES_PREVIOUS, INTRADAY_PAGE_SIZE};
use crate::models::{IntradayCandle, Ohlcv, Timeframe};
use crate::services::provider::QuoteProvider;
use crate::services::vci::VciError;
use crate::utils::deduplication::TimestampDeduplicator;
use crate::utils::{dedup_by_timestamp, to_market_time};

/// Which trading day to extract from the fetched candles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingDay {
    /// Most recent date present in the data
    Latest,
    /// The date before the most recent one
    Previous,
}

impl TradingDay {
    /// Pages to request; the previous day needs to reach further back
    pub fn max_pages(self) -> usize {
        match self {
            TradingDay::Latest => INTRADAY_PAGES_LATEST,
            TradingDay::Previous => INTRADAY_PAGES_PREVIOUS,
        }
    }
}

/// Fetch one trading day of minute candles for `symbol`, in local time
///
/// Never fails: a provider error or empty page stops pagination and the
/// candles gathered so far are used. An empty result means no data.
pub async fn fetch_intraday<P>(
    provider: &P,
    symbol: &str,
    day: TradingDay,
    now: DateTime<Utc>,
) -> Vec<IntradayCandle>
where
    P: QuoteProvider + ?Sized,
{
    let bars = fetch_minute_pages(provider, symbol, day.max_pages(), now).await;
    let candles = select_trading_day(bars, day);

    debug!(
        symbol,
        day = ?day,
        candles = candles.len(),
        date = ?candles.first().map(|c| c.date()),
        "Intraday candles selected"
    );
    candles
}

/// Page backward from `now`, following the oldest timestamp of each page
async fn fetch_minute_pages<P>(
    provider: &P,
    symbol: &str,
    max_pages: usize,
    now: DateTime<Utc>,
) -> Vec<Ohlcv>
where
    P: QuoteProvider + ?Sized,
{
    let mut dedup = TimestampDeduplicator::new();
    let mut merged = Vec::new();
    let mut cursor = now;

    for page in 0..max_pages {
        let bars = match provider
            .get_bars(symbol, Timeframe::Minute1, cursor, INTRADAY_PAGE_SIZE)
            .await
        {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) | Err(VciError::NoData) => {
                debug!(symbol, page, "Intraday page empty, stopping");
                break;
            }
            Err(e) => {
                warn!(symbol, page, error = %e, "Intraday page failed, keeping partial data");
                break;
            }
        };

        let oldest = bars.iter().map(|b| b.time).min();
        let added = dedup.extend_unique(&mut merged, bars);
        debug!(symbol, page, added, total = merged.len(), "Intraday page fetched");

        match oldest {
            Some(oldest) if oldest < cursor => cursor = oldest,
            _ => {
                debug!(symbol, page, "Intraday cursor did not move, stopping");
                break;
            }
        }
    }

    merged
}

/// Deduplicate, convert to local time and keep only the requested date
pub fn select_trading_day(bars: Vec<Ohlcv>, day: TradingDay) -> Vec<IntradayCandle> {
    let candles: Vec<IntradayCandle> = dedup_by_timestamp(bars)
        .into_iter()
        .map(|bar| IntradayCandle {
            time: to_market_time(bar.time),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })
        .collect();

    let dates: BTreeSet<NaiveDate> = candles.iter().map(IntradayCandle::date).collect();
    let target = match day {
        TradingDay::Latest => dates.iter().next_back(),
        TradingDay::Previous => dates.iter().rev().nth(1),
    };

    match target {
        Some(&date) => candles.into_iter().filter(|c| c.date() == date).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::fake::{minute_bars, FakeProvider};
    use chrono::{Duration, TimeZone};

    // 09:00 local on 2025-03-13 and 2025-03-14
    fn session_start(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 2, 0, 0).unwrap()
    }

    fn two_sessions() -> Vec<Ohlcv> {
        let mut bars = minute_bars(session_start(13), 200, 20.0);
        bars.extend(minute_bars(session_start(14), 200, 21.0));
        bars
    }

    #[tokio::test]
    async fn test_latest_day_only() {
        let provider = FakeProvider::new().with_minutes("FPT", two_sessions());
        let now = session_start(14) + Duration::hours(8);

        let candles = fetch_intraday(&provider, "FPT", TradingDay::Latest, now).await;

        // two pages of 160 overlapping by one bar reach back 319 minutes
        assert_eq!(candles.len(), 200);
        assert!(candles.iter().all(|c| c.date() == NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()));
        assert_eq!(candles[0].time.to_string(), "2025-03-14 09:00:00");
        assert!(candles.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_previous_day_uses_more_pages() {
        let provider = FakeProvider::new().with_minutes("FPT", two_sessions());
        let now = session_start(14) + Duration::hours(8);

        let candles = fetch_intraday(&provider, "FPT", TradingDay::Previous, now).await;

        assert_eq!(candles.len(), 200);
        assert!(candles.iter().all(|c| c.date() == NaiveDate::from_ymd_opt(2025, 3, 13).unwrap()));
        // the cursor stops moving once the oldest bar is reached
        assert_eq!(provider.calls().len(), INTRADAY_PAGES_PREVIOUS);
    }

    #[tokio::test]
    async fn test_overlapping_pages_are_deduplicated() {
        let provider = FakeProvider::new().with_minutes("HPG", minute_bars(session_start(14), 250, 25.0));
        let now = session_start(14) + Duration::hours(6);

        let candles = fetch_intraday(&provider, "HPG", TradingDay::Latest, now).await;

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        // second page starts at the oldest bar of the first one
        assert_eq!(calls[1].to, session_start(14) + Duration::minutes(90));
        assert_eq!(candles.len(), 250);
    }

    #[tokio::test]
    async fn test_previous_day_with_single_date_is_empty() {
        let provider = FakeProvider::new().with_minutes("VCB", minute_bars(session_start(14), 100, 90.0));
        let now = session_start(14) + Duration::hours(8);

        let candles = fetch_intraday(&provider, "VCB", TradingDay::Previous, now).await;
        assert!(candles.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_yields_empty() {
        let provider = FakeProvider::new().failing("MWG");
        let candles = fetch_intraday(&provider, "MWG", TradingDay::Latest, Utc::now()).await;

        assert!(candles.is_empty());
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_select_trading_day_groups_by_local_date() {
        // 17:30 UTC on the 13th is already the 14th locally
        let late = Utc.with_ymd_and_hms(2025, 3, 13, 17, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 3, 13, 3, 0, 0).unwrap();
        let bars = vec![
            Ohlcv::new(late, 1.0, 1.0, 1.0, 1.0, 1),
            Ohlcv::new(early, 2.0, 2.0, 2.0, 2.0, 2),
        ];

        let latest = select_trading_day(bars.clone(), TradingDay::Latest);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].time.to_string(), "2025-03-14 00:30:00");

        let previous = select_trading_day(bars, TradingDay::Previous);
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].close, 2.0);
    }
}
