//! Vietcap (VCI) OHLC chart client
//!
//! Wraps the `chart/OHLCChart/gap-chart` endpoint. Requests go through a
//! shared sliding-window rate limiter and are retried with jittered
//! exponential backoff on throttling, server errors and network failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use isahc::{config::Configurable, prelude::*, HttpClient};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::models::{Ohlcv, Timeframe};
use crate::services::provider::QuoteProvider;

#[derive(Debug)]
pub enum VciError {
    Http(isahc::Error),
    Serialization(serde_json::Error),
    InvalidResponse(String),
    RateLimit,
    NoData,
}

impl From<isahc::Error> for VciError {
    fn from(error: isahc::Error) -> Self {
        VciError::Http(error)
    }
}

impl From<serde_json::Error> for VciError {
    fn from(error: serde_json::Error) -> Self {
        VciError::Serialization(error)
    }
}

impl std::fmt::Display for VciError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VciError::Http(e) => write!(f, "HTTP error: {}", e),
            VciError::Serialization(e) => write!(f, "Serialization error: {}", e),
            VciError::InvalidResponse(s) => write!(f, "Invalid response: {}", s),
            VciError::RateLimit => write!(f, "Rate limit exceeded"),
            VciError::NoData => write!(f, "No data available"),
        }
    }
}

impl std::error::Error for VciError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VciError::Http(e) => Some(e),
            VciError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

/// Sliding-window rate limiter shared by every request to the provider
#[derive(Debug)]
pub struct SharedRateLimiter {
    /// Start times of requests inside the current window
    request_timestamps: TokioMutex<Vec<Instant>>,
    max_requests: u32,
    window: Duration,
}

impl SharedRateLimiter {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self::with_window(rate_limit_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            request_timestamps: TokioMutex::new(Vec::new()),
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Wait until a request slot is free, then claim it
    pub async fn acquire(&self) {
        loop {
            let now = Instant::now();
            let mut timestamps = self.request_timestamps.lock().await;
            timestamps.retain(|&t| now.duration_since(t) < self.window);

            if timestamps.len() < self.max_requests as usize {
                timestamps.push(now);
                return;
            }

            let wait = self.window.saturating_sub(now.duration_since(timestamps[0]));
            // Release the lock while sleeping so other tasks can inspect the window
            drop(timestamps);
            debug!(wait_ms = wait.as_millis() as u64, "VCI rate limit reached, waiting");
            sleep(wait + Duration::from_millis(100)).await;
        }
    }

    /// Requests counted in the current window
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        let timestamps = self.request_timestamps.lock().await;
        timestamps.iter().filter(|&&t| now.duration_since(t) < self.window).count()
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
];

const MAX_RETRIES: u32 = 3;

/// A browser user agent picked at random per request
fn random_user_agent() -> &'static str {
    use rand::seq::SliceRandom;
    USER_AGENTS.choose(&mut rand::thread_rng()).copied().unwrap_or(USER_AGENTS[0])
}

#[derive(Clone)]
pub struct VciClient {
    client: HttpClient,
    base_url: String,
    rate_limiter: Arc<SharedRateLimiter>,
}

impl VciClient {
    /// Create a client with its own rate limiter
    pub fn new(base_url: &str, timeout: Duration, rate_limit_per_minute: u32) -> Result<Self, VciError> {
        Self::with_rate_limiter(
            base_url,
            timeout,
            Arc::new(SharedRateLimiter::new(rate_limit_per_minute)),
        )
    }

    /// Create a client that shares `rate_limiter` with other clients
    pub fn with_rate_limiter(
        base_url: &str,
        timeout: Duration,
        rate_limiter: Arc<SharedRateLimiter>,
    ) -> Result<Self, VciError> {
        let client = HttpClient::builder().timeout(timeout).build()?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        info!(base_url = %base_url, timeout_secs = timeout.as_secs(), "VCI client initialized");

        Ok(Self {
            client,
            base_url,
            rate_limiter,
        })
    }

    async fn make_request(&self, url: &str, payload: &Value) -> Result<Value, VciError> {
        let body = serde_json::to_string(payload)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs_f64(2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>())
                    .min(Duration::from_secs(60));
                info!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    reason = last_error.as_deref().unwrap_or("unknown error"),
                    delay_secs = delay.as_secs_f64(),
                    "VCI API retry backoff"
                );
                sleep(delay).await;
            }

            self.rate_limiter.acquire().await;

            debug!(attempt = attempt + 1, url, payload_size = body.len(), "VCI request");

            let request = isahc::Request::builder()
                .uri(url)
                .method("POST")
                .header("Accept", "application/json, text/plain, */*")
                .header("Accept-Language", "en-US,en;q=0.9,vi-VN;q=0.8,vi;q=0.7")
                .header("Content-Type", "application/json")
                .header("Cache-Control", "no-cache")
                .header("User-Agent", random_user_agent())
                .header("Referer", "https://trading.vietcap.com.vn/")
                .header("Origin", "https://trading.vietcap.com.vn")
                .body(body.clone())
                .map_err(|e| VciError::InvalidResponse(format!("Request build error: {}", e)))?;

            match self.client.send_async(request).await {
                Ok(mut resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        match resp.text().await {
                            Ok(text) => match serde_json::from_str::<Value>(&text) {
                                Ok(data) => return Ok(data),
                                Err(e) => last_error = Some(format!("JSON parse error: {}", e)),
                            },
                            Err(e) => last_error = Some(format!("Response body error: {}", e)),
                        }
                    } else if status == 403 {
                        last_error = Some("Forbidden (403) - rate limit or auth issue".to_string());
                    } else if status == 429 {
                        last_error = Some("Too Many Requests (429) - rate limited".to_string());
                    } else if status.is_server_error() {
                        last_error = Some(format!("Server error ({})", status.as_u16()));
                    } else if status.is_client_error() {
                        // Request problem, retrying will not help
                        return Err(VciError::InvalidResponse(format!(
                            "Client error ({}) - not retryable",
                            status.as_u16()
                        )));
                    } else {
                        last_error = Some(format!("HTTP error ({})", status.as_u16()));
                    }
                }
                Err(e) => last_error = Some(format!("Network error: {}", e)),
            }
        }

        let reason = last_error.unwrap_or_else(|| "unknown error".to_string());
        warn!(url, reason = %reason, "VCI request failed after retries");
        if reason.contains("429") {
            return Err(VciError::RateLimit);
        }
        Err(VciError::InvalidResponse(format!("Max retries exceeded: {}", reason)))
    }

    /// Fetch up to `count_back` bars ending at `to`, sorted ascending
    pub async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        to: DateTime<Utc>,
        count_back: u32,
    ) -> Result<Vec<Ohlcv>, VciError> {
        let url = format!("{}chart/OHLCChart/gap-chart", self.base_url);
        let payload = serde_json::json!({
            "timeFrame": timeframe.to_vci_format(),
            "symbols": [symbol],
            "to": to.timestamp(),
            "countBack": count_back
        });

        debug!(
            symbol,
            timeframe = %timeframe,
            to = to.timestamp(),
            count_back,
            "VCI_GET_BARS"
        );

        let response = self.make_request(&url, &payload).await?;
        parse_gap_chart(symbol, &response)
    }
}

#[async_trait]
impl QuoteProvider for VciClient {
    fn name(&self) -> &str {
        crate::constants::DATA_SOURCE
    }

    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        to: DateTime<Utc>,
        count_back: u32,
    ) -> Result<Vec<Ohlcv>, VciError> {
        VciClient::get_bars(self, symbol, timeframe, to, count_back).await
    }
}

/// Parse a gap-chart response into bars for `symbol`
///
/// The response is an array of column-oriented objects
/// (`o`, `h`, `l`, `c`, `v`, `t`). Rows with a non-numeric price or
/// timestamp are skipped. Columns of unequal length are truncated to the
/// shortest one.
pub fn parse_gap_chart(symbol: &str, response: &Value) -> Result<Vec<Ohlcv>, VciError> {
    let items = response
        .as_array()
        .ok_or_else(|| VciError::InvalidResponse("Expected a JSON array".to_string()))?;

    if items.is_empty() {
        return Err(VciError::NoData);
    }

    let data_item = items
        .iter()
        .find(|item| {
            item.get("symbol")
                .and_then(|s| s.as_str())
                .map(|s| s.eq_ignore_ascii_case(symbol))
                .unwrap_or(false)
        })
        .unwrap_or(&items[0]);

    let opens = column(data_item, "o")?;
    let highs = column(data_item, "h")?;
    let lows = column(data_item, "l")?;
    let closes = column(data_item, "c")?;
    let volumes = column(data_item, "v")?;
    let times = column(data_item, "t")?;

    let length = [opens.len(), highs.len(), lows.len(), closes.len(), volumes.len(), times.len()]
        .into_iter()
        .min()
        .unwrap_or(0);
    if length != times.len() {
        warn!(symbol, times = times.len(), usable = length, "VCI columns have inconsistent lengths");
    }

    let mut result = Vec::with_capacity(length);
    let mut skipped = 0usize;

    for i in 0..length {
        let time = parse_timestamp(&times[i]).and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        let prices = (opens[i].as_f64(), highs[i].as_f64(), lows[i].as_f64(), closes[i].as_f64());

        match (time, prices) {
            (Some(time), (Some(open), Some(high), Some(low), Some(close))) => {
                let volume = volumes[i]
                    .as_u64()
                    .or_else(|| volumes[i].as_f64().map(|v| v.max(0.0) as u64))
                    .unwrap_or(0);
                result.push(Ohlcv::new(time, open, high, low, close, volume));
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(symbol, skipped, "Skipped malformed VCI rows");
    }

    if result.is_empty() {
        return Err(VciError::NoData);
    }

    result.sort_by_key(|bar| bar.time);
    Ok(result)
}

fn column<'a>(item: &'a Value, key: &str) -> Result<&'a Vec<Value>, VciError> {
    item.get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| VciError::InvalidResponse(format!("Missing key: {}", key)))
}

/// Timestamps arrive either as numbers or as numeric strings
fn parse_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_agent_comes_from_pool() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn test_parse_gap_chart_picks_requested_symbol() {
        let response = json!([
            {"symbol": "FPT", "o": [1.0], "h": [1.0], "l": [1.0], "c": [1.0], "v": [1], "t": [1710381600]},
            {"symbol": "VCB", "o": [90.0, 91.0], "h": [92.0, 93.0], "l": [89.0, 90.5],
             "c": [91.5, 92.5], "v": [1000, 2000], "t": ["1710468000", 1710381600]}
        ]);

        let bars = parse_gap_chart("VCB", &response).unwrap();
        assert_eq!(bars.len(), 2);
        // sorted ascending regardless of response order
        assert_eq!(bars[0].time.timestamp(), 1710381600);
        assert_eq!(bars[0].close, 92.5);
        assert_eq!(bars[1].volume, 1000);
    }

    #[test]
    fn test_parse_gap_chart_skips_malformed_rows() {
        let response = json!([
            {"symbol": "ACB", "o": [24.0, null, 24.2], "h": [24.5, 24.5, 24.6],
             "l": [23.9, 23.9, 24.0], "c": [24.1, 24.3, 24.4],
             "v": [100.0, 200, 300], "t": [1710381600, 1710381660, "bad"]}
        ]);

        let bars = parse_gap_chart("ACB", &response).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 100);
    }

    #[test]
    fn test_parse_gap_chart_truncates_uneven_columns() {
        let response = json!([
            {"symbol": "HPG", "o": [1.0, 2.0, 3.0], "h": [1.0, 2.0], "l": [1.0, 2.0, 3.0],
             "c": [1.0, 2.0, 3.0], "v": [1, 2, 3], "t": [100, 200, 300]}
        ]);

        let bars = parse_gap_chart("HPG", &response).unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn test_parse_gap_chart_empty_and_invalid() {
        assert!(matches!(parse_gap_chart("VCB", &json!([])), Err(VciError::NoData)));
        assert!(matches!(
            parse_gap_chart("VCB", &json!({"error": "x"})),
            Err(VciError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_gap_chart("VCB", &json!([{"symbol": "VCB", "o": []}])),
            Err(VciError::InvalidResponse(_))
        ));
        let empty_columns = json!([{"symbol": "VCB", "o": [], "h": [], "l": [], "c": [], "v": [], "t": []}]);
        assert!(matches!(parse_gap_chart("VCB", &empty_columns), Err(VciError::NoData)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_waits_for_window() {
        let limiter = SharedRateLimiter::with_window(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.in_flight().await, 2);
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let client = VciClient::new("https://example.invalid/api", Duration::from_secs(10), 30).unwrap();
        assert_eq!(client.base_url, "https://example.invalid/api/");
    }
}
