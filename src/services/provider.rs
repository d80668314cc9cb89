use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Ohlcv, Timeframe};
use crate::services::vci::VciError;

/// Source of OHLCV bars for a single symbol
///
/// `get_bars` returns at most `count_back` bars whose time is at or before
/// `to`, sorted ascending. An empty result is reported as
/// [`VciError::NoData`].
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name recorded as the overview `source`
    fn name(&self) -> &str;

    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        to: DateTime<Utc>,
        count_back: u32,
    ) -> Result<Vec<Ohlcv>, VciError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use chrono::Duration;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// One recorded `get_bars` call
    #[derive(Debug, Clone, PartialEq)]
    pub struct BarRequest {
        pub symbol: String,
        pub timeframe: Timeframe,
        pub to: DateTime<Utc>,
        pub count_back: u32,
    }

    /// In-memory provider serving canned bars
    #[derive(Default)]
    pub struct FakeProvider {
        daily: HashMap<String, Vec<Ohlcv>>,
        minutes: HashMap<String, Vec<Ohlcv>>,
        failing: HashSet<String>,
        calls: Mutex<Vec<BarRequest>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_daily(mut self, symbol: &str, bars: Vec<Ohlcv>) -> Self {
            self.daily.insert(symbol.to_string(), bars);
            self
        }

        pub fn with_minutes(mut self, symbol: &str, bars: Vec<Ohlcv>) -> Self {
            self.minutes.insert(symbol.to_string(), bars);
            self
        }

        /// Every request for `symbol` fails
        pub fn failing(mut self, symbol: &str) -> Self {
            self.failing.insert(symbol.to_string());
            self
        }

        pub fn calls(&self) -> Vec<BarRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn get_bars(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            to: DateTime<Utc>,
            count_back: u32,
        ) -> Result<Vec<Ohlcv>, VciError> {
            self.calls.lock().unwrap().push(BarRequest {
                symbol: symbol.to_string(),
                timeframe,
                to,
                count_back,
            });

            if self.failing.contains(symbol) {
                return Err(VciError::InvalidResponse("scripted failure".to_string()));
            }

            let source = match timeframe {
                Timeframe::Day1 => &self.daily,
                Timeframe::Minute1 => &self.minutes,
            };

            let mut bars: Vec<Ohlcv> = source
                .get(symbol)
                .map(|bars| bars.iter().filter(|b| b.time <= to).cloned().collect())
                .unwrap_or_default();
            bars.sort_by_key(|b| b.time);

            let skip = bars.len().saturating_sub(count_back as usize);
            let page: Vec<Ohlcv> = bars.into_iter().skip(skip).collect();
            if page.is_empty() {
                return Err(VciError::NoData);
            }
            Ok(page)
        }
    }

    /// `count` consecutive minute bars starting at `start`, price rising by 0.1
    pub fn minute_bars(start: DateTime<Utc>, count: usize, base_price: f64) -> Vec<Ohlcv> {
        (0..count)
            .map(|i| {
                let price = base_price + i as f64 * 0.1;
                Ohlcv::new(
                    start + Duration::minutes(i as i64),
                    price,
                    price + 0.2,
                    price - 0.2,
                    price + 0.05,
                    100 + i as u64,
                )
            })
            .collect()
    }

    /// One daily bar per entry of `closes`, one day apart, ending at `last`
    pub fn daily_bars(last: DateTime<Utc>, closes: &[f64]) -> Vec<Ohlcv> {
        let n = closes.len() as i64;
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Ohlcv::new(
                    last - Duration::days(n - 1 - i as i64),
                    close - 0.5,
                    close + 1.0,
                    close - 1.0,
                    close,
                    10_000 + i as u64,
                )
            })
            .collect()
    }
}
