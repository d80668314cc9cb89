//! Market overview aggregation
//!
//! Fetches the VN30 index and its constituents, ranks the day's movers and
//! appends an index pseudo-record carrying the index intraday series.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::constants::{is_index, TOP_MOVERS_LIMIT, VN30_INDEX_NAME, VN30_INDEX_SYMBOL, VN30_SYMBOLS};
use crate::models::{
    IndexSnapshot, IntradayCandle, MarketOverview, MarketSnapshot, PricePoint, StockRecord, StockSummary,
};
use crate::services::intraday::{fetch_intraday, TradingDay};
use crate::services::provider::QuoteProvider;
use crate::services::symbol_fetcher::SymbolFetcher;
use crate::utils::round2;

/// Failures that abort an aggregation run
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("{0} index data unavailable")]
    IndexUnavailable(String),

    #[error("no constituent symbol returned data")]
    NoSymbols,
}

pub struct MarketOverviewAggregator<P: ?Sized> {
    fetcher: SymbolFetcher<P>,
    symbols: Vec<String>,
    symbol_delay: Duration,
}

impl<P: QuoteProvider + ?Sized> MarketOverviewAggregator<P> {
    /// Aggregator over the VN30 constituents, pausing `symbol_delay`
    /// between symbol requests
    pub fn new(provider: Arc<P>, price_multiplier: f64, symbol_delay: Duration) -> Self {
        Self {
            fetcher: SymbolFetcher::new(provider, price_multiplier),
            symbols: VN30_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            symbol_delay,
        }
    }

    /// Replace the constituent list
    pub fn with_symbols<S: AsRef<str>>(mut self, symbols: &[S]) -> Self {
        self.symbols = symbols.iter().map(|s| s.as_ref().to_uppercase()).collect();
        self
    }

    pub async fn fetch_market_overview(&self) -> Result<MarketSnapshot, AggregationError> {
        self.fetch_market_overview_at(Utc::now()).await
    }

    /// Build the overview and the records to persist, as of `now`
    #[instrument(skip(self), fields(symbols = self.symbols.len()))]
    pub async fn fetch_market_overview_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<MarketSnapshot, AggregationError> {
        info!("Fetching latest market overview");

        let index = match self.fetcher.fetch_index(VN30_INDEX_SYMBOL, now).await {
            Some(index) => index,
            None => {
                warn!(index = VN30_INDEX_SYMBOL, "Failed to fetch index");
                return Err(AggregationError::IndexUnavailable(VN30_INDEX_SYMBOL.to_string()));
            }
        };

        // The index session dates the overview and every record saved with it
        let date = index.date;

        let mut stocks = self.fetch_constituents(now).await;
        stocks.retain(|stock| {
            let current = stock.date == date;
            if !current {
                warn!(symbol = %stock.symbol, last_session = %stock.date, date = %date, "Stale constituent, excluding");
            }
            current
        });
        if stocks.is_empty() {
            warn!(date = %date, "No constituent data for the trading date");
            return Err(AggregationError::NoSymbols);
        }

        let total_stocks = stocks.len();
        let (top_gainers, top_losers) = rank_top_movers(&stocks, TOP_MOVERS_LIMIT);

        let intraday = fetch_intraday(self.fetcher.provider(), VN30_INDEX_SYMBOL, TradingDay::Latest, now).await;
        match synthesize_index_record(&index, &intraday) {
            Some(record) if record.date == date => {
                info!(candles = record.prices.len(), date = %record.date, "Index intraday attached");
                stocks.push(record);
            }
            Some(record) => warn!(
                intraday_date = %record.date,
                date = %date,
                "Index intraday is from another session, skipping index record"
            ),
            None => warn!("No index intraday data, skipping index record"),
        }

        let overview = MarketOverview {
            date,
            vn30_index: IndexSnapshot::from(&index),
            top_gainers,
            top_losers,
            total_stocks,
            timestamp: now,
            source: self.fetcher.provider().name().to_string(),
        };

        Ok(MarketSnapshot {
            overview,
            stocks,
            index_intraday: intraday,
        })
    }

    /// Fetch each constituent in order, pausing between requests
    async fn fetch_constituents(&self, now: DateTime<Utc>) -> Vec<StockRecord> {
        let mut stocks = Vec::with_capacity(self.symbols.len());

        for (i, symbol) in self.symbols.iter().enumerate() {
            if i > 0 && !self.symbol_delay.is_zero() {
                tokio::time::sleep(self.symbol_delay).await;
            }

            info!(symbol = %symbol, progress = %format!("{}/{}", i + 1, self.symbols.len()), "Fetching symbol");
            if let Some(record) = self.fetcher.fetch_stock(symbol, now).await {
                stocks.push(record);
            }
        }

        info!(
            fetched = stocks.len(),
            requested = self.symbols.len(),
            "Constituent fetch complete"
        );
        stocks
    }
}

/// Split movers into gainers (highest first) and losers (lowest first)
///
/// Only strictly positive and strictly negative changes qualify, index
/// records are ignored and each list holds at most `limit` entries.
pub fn rank_top_movers(stocks: &[StockRecord], limit: usize) -> (Vec<StockSummary>, Vec<StockSummary>) {
    let candidates = stocks.iter().filter(|s| !is_index(&s.symbol));

    let mut gainers: Vec<&StockRecord> = candidates.clone().filter(|s| s.change_percent > 0.0).collect();
    gainers.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));

    let mut losers: Vec<&StockRecord> = candidates.filter(|s| s.change_percent < 0.0).collect();
    losers.sort_by(|a, b| a.change_percent.total_cmp(&b.change_percent));

    (
        gainers.into_iter().take(limit).map(StockSummary::from).collect(),
        losers.into_iter().take(limit).map(StockSummary::from).collect(),
    )
}

/// Pseudo-stock record for the index built from its intraday series
///
/// OHLC come from the series, price and change from the daily index
/// record. `None` when the series is empty.
pub fn synthesize_index_record(index: &StockRecord, intraday: &[IntradayCandle]) -> Option<StockRecord> {
    let first = intraday.first()?;
    let last = intraday.last()?;

    let high = intraday.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = intraday.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let volume = intraday.iter().map(|c| c.volume).sum();

    Some(StockRecord {
        symbol: VN30_INDEX_SYMBOL.to_string(),
        date: first.date(),
        company_name: VN30_INDEX_NAME.to_string(),
        price: index.price,
        open: round2(first.open),
        high: round2(high),
        low: round2(low),
        close: round2(last.close),
        previous_close: index.previous_close,
        change: index.change,
        change_percent: index.change_percent,
        volume,
        prices: intraday
            .iter()
            .map(|c| PricePoint {
                time: c.time,
                price: c.close,
                volume: c.volume,
            })
            .collect(),
        indicators: index.indicators.clone(),
        fetched_at: index.fetched_at,
    })
}
