pub mod deduplication;
pub mod logging;
pub mod market_time;

pub use deduplication::dedup_by_timestamp;
pub use market_time::{market_date, market_now, market_today, to_market_time};

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.419_834), 0.42);
        assert_eq!(round2(-1.005_1), -1.01);
        assert_eq!(round2(1250.5), 1250.5);
    }
}
