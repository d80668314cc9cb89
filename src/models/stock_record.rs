use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::indicators::TechnicalIndicators;
use super::intraday_candle::local_datetime;

/// Normalized per-symbol record for one trading day
///
/// # Price Format
/// Stock prices are the provider's value multiplied by the configured price
/// multiplier. Index records (VN30) are never rescaled.
///
/// `(symbol, date)` is the storage key: saving a record for an existing key
/// replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    /// Ticker symbol, upper case
    pub symbol: String,

    /// Trading date (local market calendar)
    pub date: NaiveDate,

    pub company_name: String,

    /// Latest price (same as `close`)
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub previous_close: f64,

    /// `close - previous_close`
    pub change: f64,

    /// Percentage change, 0 when previous close is not positive
    pub change_percent: f64,

    pub volume: u64,

    /// Intraday price series, chronological
    #[serde(default)]
    pub prices: Vec<PricePoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<TechnicalIndicators>,

    pub fetched_at: DateTime<Utc>,
}

impl StockRecord {
    /// Compact view used in the top gainers/losers lists
    pub fn summary(&self) -> StockSummary {
        StockSummary::from(self)
    }
}

/// One point of the intraday price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Local market time
    #[serde(with = "local_datetime")]
    pub time: NaiveDateTime,
    pub price: f64,
    pub volume: u64,
}

/// StockRecord without the intraday series and indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub symbol: String,
    pub date: NaiveDate,
    pub company_name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    pub previous_close: f64,
}

impl From<&StockRecord> for StockSummary {
    fn from(record: &StockRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            date: record.date,
            company_name: record.company_name.clone(),
            price: record.price,
            change: record.change,
            change_percent: record.change_percent,
            volume: record.volume,
            high: record.high,
            low: record.low,
            open: record.open,
            close: record.close,
            previous_close: record.previous_close,
        }
    }
}
