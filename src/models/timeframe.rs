use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar resolution requested from the upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1-minute candles
    Minute1,
    /// Daily candles
    Day1,
}

impl Timeframe {
    /// Value of the `timeFrame` field in the gap-chart request
    pub fn to_vci_format(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "ONE_MINUTE",
            Timeframe::Day1 => "ONE_DAY",
        }
    }

    /// Short interval label used in logs
    pub fn to_interval_string(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Day1 => "1D",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_interval_string())
    }
}
