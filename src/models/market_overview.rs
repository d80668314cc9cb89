use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::intraday_candle::IntradayCandle;
use super::stock_record::{StockRecord, StockSummary};

/// VN30 index value for the trading day (never rescaled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub index: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl From<&StockRecord> for IndexSnapshot {
    fn from(record: &StockRecord) -> Self {
        Self {
            index: record.close,
            change: record.change,
            change_percent: record.change_percent,
        }
    }
}

/// Market summary for one trading day, keyed by `date`
///
/// `top_gainers` holds only positive movers, highest first. `top_losers`
/// holds only negative movers, most negative first. Neither contains the
/// index pseudo-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub date: NaiveDate,

    #[serde(rename = "vn30Index")]
    pub vn30_index: IndexSnapshot,

    pub top_gainers: Vec<StockSummary>,

    pub top_losers: Vec<StockSummary>,

    /// Constituent symbols fetched successfully (index excluded)
    pub total_stocks: usize,

    /// Wall-clock time of the fetch
    pub timestamp: DateTime<Utc>,

    /// Upstream provider name
    pub source: String,
}

/// Output of one aggregation run: the overview plus every record to persist
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub overview: MarketOverview,

    /// Constituent records followed by the index pseudo-record, if any
    pub stocks: Vec<StockRecord>,

    /// Index minute candles of the latest session, possibly empty
    pub index_intraday: Vec<IntradayCandle>,
}

impl MarketSnapshot {
    pub fn date(&self) -> NaiveDate {
        self.overview.date
    }
}
