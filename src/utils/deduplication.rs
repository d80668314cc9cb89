//! Timestamp deduplication for paginated candle fetches
//!
//! Consecutive pages overlap at the cursor boundary, so the same bar can
//! arrive twice. The key is the exact bar timestamp; minute candles never
//! share one.

use crate::models::Ohlcv;
use std::collections::HashSet;

/// Tracks timestamps already accepted while merging pages
#[derive(Debug, Default)]
pub struct TimestampDeduplicator {
    seen_keys: HashSet<i64>,
}

impl TimestampDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduplication key for a bar
    pub fn get_key(record: &Ohlcv) -> i64 {
        record.time.timestamp()
    }

    /// Returns true if a bar with the same timestamp was already seen
    pub fn is_duplicate(&mut self, record: &Ohlcv) -> bool {
        !self.seen_keys.insert(Self::get_key(record))
    }

    /// Push the bars of one page into `merged`, skipping known timestamps.
    /// Returns how many bars were new.
    pub fn extend_unique(&mut self, merged: &mut Vec<Ohlcv>, page: Vec<Ohlcv>) -> usize {
        let before = merged.len();
        for bar in page {
            if !self.is_duplicate(&bar) {
                merged.push(bar);
            }
        }
        merged.len() - before
    }

    pub fn len(&self) -> usize {
        self.seen_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_keys.is_empty()
    }
}

/// Drop repeated timestamps (first occurrence wins) and sort ascending
pub fn dedup_by_timestamp(records: Vec<Ohlcv>) -> Vec<Ohlcv> {
    let mut dedup = TimestampDeduplicator::new();
    let mut unique = Vec::with_capacity(records.len());
    dedup.extend_unique(&mut unique, records);
    unique.sort_by_key(|r| r.time);
    unique
}
