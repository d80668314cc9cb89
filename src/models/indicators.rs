//! Technical indicators computed over the trailing daily window
//!
//! These are textbook formulas applied to the ~30 daily closes fetched per
//! symbol. They are a convenience for the downstream API, not an analytics
//! engine.
//!
//! # Price Format
//! Callers pass closes already multiplied by the price multiplier, so moving
//! averages and MACD come out in record units. RSI is unitless.

use serde::{Deserialize, Serialize};

use crate::utils::round2;

/// RSI lookback used by the daily cache
pub const RSI_PERIOD: usize = 14;

/// Indicator snapshot attached to a [`StockRecord`](super::StockRecord)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub ma5: f64,
    pub ma10: f64,
    pub ma20: f64,
    pub rsi: f64,
    pub macd: f64,
}

impl TechnicalIndicators {
    /// Compute all indicators from chronological closes.
    ///
    /// Returns `None` when there are no closes at all.
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        let latest = *closes.last()?;

        let ma = |period: usize| latest_sma(closes, period).unwrap_or(latest);

        Some(Self {
            ma5: round2(ma(5)),
            ma10: round2(ma(10)),
            ma20: round2(ma(20)),
            rsi: round2(calculate_rsi(closes)),
            macd: round2(ma(12) - ma(26)),
        })
    }
}

/// Calculate Simple Moving Average for a given period
///
/// # Returns
/// * Vector of MA values aligned with `closes` (early values are 0.0)
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    let mut ma_values = vec![0.0; closes.len()];

    if period == 0 || closes.len() < period {
        return ma_values;
    }

    for i in (period - 1)..closes.len() {
        let start_idx = i + 1 - period;
        let sum: f64 = closes[start_idx..=i].iter().sum();
        ma_values[i] = sum / period as f64;
    }

    ma_values
}

/// SMA of the most recent `period` closes, `None` if there are fewer
pub fn latest_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    calculate_sma(closes, period).last().copied()
}

/// Simple (non-smoothed) RSI over the last [`RSI_PERIOD`] sessions
///
/// Gains and losses are averaged over the full period even when fewer
/// differences are available. A window without losses uses 0.01 as the
/// average loss.
pub fn calculate_rsi(closes: &[f64]) -> f64 {
    let n = closes.len();
    let mut total_gain = 0.0;
    let mut total_loss = 0.0;

    for i in 1..RSI_PERIOD.min(n) {
        let diff = closes[n - i] - closes[n - i - 1];
        if diff > 0.0 {
            total_gain += diff;
        } else {
            total_loss += diff.abs();
        }
    }

    let avg_gain = total_gain / RSI_PERIOD as f64;
    let avg_loss = if total_loss > 0.0 {
        total_loss / RSI_PERIOD as f64
    } else {
        0.01
    };

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
