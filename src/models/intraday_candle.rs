use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Minute candle in local market time (UTC+7)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayCandle {
    /// Local wall-clock time of the candle, `YYYY-MM-DD HH:MM:SS`
    #[serde(with = "local_datetime")]
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl IntradayCandle {
    /// Local calendar date of the candle
    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }
}

/// Serde adapter for local timestamps stored as `%Y-%m-%d %H:%M:%S`
pub(crate) mod local_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
