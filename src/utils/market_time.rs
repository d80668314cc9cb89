use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Asia::Ho_Chi_Minh;
use chrono_tz::Tz;

use crate::constants::MARKET_UTC_OFFSET_SECS;

/// Current time in the Vietnam market timezone
pub fn market_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&Ho_Chi_Minh)
}

/// Today's calendar date in the Vietnam market timezone
pub fn market_today() -> NaiveDate {
    market_now().date_naive()
}

/// Shift an upstream UTC timestamp to local (UTC+7) wall-clock time
pub fn to_market_time(time: DateTime<Utc>) -> NaiveDateTime {
    time.naive_utc() + Duration::seconds(MARKET_UTC_OFFSET_SECS as i64)
}

/// Local calendar date of an upstream UTC timestamp
pub fn market_date(time: DateTime<Utc>) -> NaiveDate {
    to_market_time(time).date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_shift_to_utc_plus_7() {
        let utc = Utc.with_ymd_and_hms(2025, 3, 14, 2, 15, 0).unwrap();
        let local = to_market_time(utc);
        assert_eq!(local.to_string(), "2025-03-14 09:15:00");
    }

    #[test]
    fn test_date_rolls_over_after_17_utc() {
        let utc = Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap();
        assert_eq!(market_date(utc), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
    }
}
