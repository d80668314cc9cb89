//! Per-symbol daily record fetching
//!
//! Turns the trailing daily window of one symbol into a normalized
//! [`StockRecord`]: latest session prices, change against the previous
//! session, intraday series and indicators.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::constants::{company_name, is_index, DAILY_HISTORY_BARS, VN30_INDEX_NAME};
use crate::models::{IntradayCandle, Ohlcv, PricePoint, StockRecord, TechnicalIndicators, Timeframe};
use crate::services::intraday::{fetch_intraday, TradingDay};
use crate::services::provider::QuoteProvider;
use crate::services::vci::VciError;
use crate::utils::{market_date, round2};

pub struct SymbolFetcher<P: ?Sized> {
    provider: Arc<P>,
    price_multiplier: f64,
}

impl<P: QuoteProvider + ?Sized> SymbolFetcher<P> {
    pub fn new(provider: Arc<P>, price_multiplier: f64) -> Self {
        Self {
            provider,
            price_multiplier,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Latest trading day record for a stock, with intraday prices.
    /// `None` when the symbol has no usable data.
    pub async fn fetch_stock(&self, symbol: &str, now: DateTime<Utc>) -> Option<StockRecord> {
        let daily = self.fetch_daily(symbol, now).await?;
        let intraday = fetch_intraday(&*self.provider, symbol, TradingDay::Latest, now).await;

        build_record(symbol, &daily, &intraday, self.price_multiplier, now)
    }

    /// Latest trading day record for an index. Never rescaled and carries
    /// no intraday series.
    pub async fn fetch_index(&self, symbol: &str, now: DateTime<Utc>) -> Option<StockRecord> {
        let daily = self.fetch_daily(symbol, now).await?;
        build_record(symbol, &daily, &[], 1.0, now)
    }

    async fn fetch_daily(&self, symbol: &str, now: DateTime<Utc>) -> Option<Vec<Ohlcv>> {
        match self
            .provider
            .get_bars(symbol, Timeframe::Day1, now, DAILY_HISTORY_BARS)
            .await
        {
            Ok(bars) if !bars.is_empty() => {
                debug!(symbol, bars = bars.len(), "Daily window fetched");
                Some(bars)
            }
            Ok(_) | Err(VciError::NoData) => {
                warn!(symbol, "No daily data found");
                None
            }
            Err(e) => {
                error!(symbol, error = %e, "Error fetching daily data");
                None
            }
        }
    }
}

/// `(change, change_percent)` of `close` against `previous_close`, rounded
/// to 2 decimals. The percentage is 0 when the previous close is not positive.
pub fn calculate_change(close: f64, previous_close: f64) -> (f64, f64) {
    let change = close - previous_close;
    let change_percent = if previous_close > 0.0 {
        change / previous_close * 100.0
    } else {
        0.0
    };
    (round2(change), round2(change_percent))
}

/// Build a record from a chronological daily window
///
/// The last bar is the latest session. The previous close comes from the
/// bar before it, or from the latest open when only one bar exists. All
/// prices are multiplied by `multiplier`.
pub fn build_record(
    symbol: &str,
    daily: &[Ohlcv],
    intraday: &[IntradayCandle],
    multiplier: f64,
    fetched_at: DateTime<Utc>,
) -> Option<StockRecord> {
    let latest = daily.last()?;
    let previous_close = match daily.len() {
        n if n > 1 => daily[n - 2].close,
        _ => latest.open,
    } * multiplier;

    let close = latest.close * multiplier;
    let (change, change_percent) = calculate_change(close, previous_close);

    let closes: Vec<f64> = daily.iter().map(|bar| bar.close * multiplier).collect();
    let indicators = TechnicalIndicators::from_closes(&closes);

    let prices = intraday
        .iter()
        .map(|candle| PricePoint {
            time: candle.time,
            price: round2(candle.close * multiplier),
            volume: candle.volume,
        })
        .collect();

    let symbol = symbol.to_uppercase();
    let name = if is_index(&symbol) {
        VN30_INDEX_NAME
    } else {
        company_name(&symbol)
    };

    Some(StockRecord {
        date: market_date(latest.time),
        company_name: name.to_string(),
        price: round2(close),
        open: round2(latest.open * multiplier),
        high: round2(latest.high * multiplier),
        low: round2(latest.low * multiplier),
        close: round2(close),
        previous_close: round2(previous_close),
        change,
        change_percent,
        volume: latest.volume,
        prices,
        indicators,
        fetched_at,
        symbol,
    })
}
