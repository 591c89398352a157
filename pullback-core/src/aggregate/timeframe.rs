//! Candle timeframes and bucket arithmetic.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A candle width in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeframe(u32);

impl Timeframe {
    pub const M1: Timeframe = Timeframe(1);
    pub const M5: Timeframe = Timeframe(5);
    pub const M15: Timeframe = Timeframe(15);

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub const fn minutes(&self) -> u32 {
        self.0
    }

    /// Non-zero and divides a day evenly, so buckets never straddle midnight.
    pub fn is_valid(&self) -> bool {
        self.0 > 0 && MINUTES_PER_DAY % self.0 == 0
    }

    /// Start of the bucket containing `time`: minute-of-day floored to a
    /// multiple of the width, seconds and sub-seconds zeroed.
    pub fn bucket_start(&self, time: NaiveDateTime) -> NaiveDateTime {
        let width = self.0.max(1);
        let minute_of_day = time.hour() * 60 + time.minute();
        let floored = minute_of_day - minute_of_day % width;
        let start = NaiveTime::from_hms_opt(floored / 60, floored % 60, 0).unwrap_or(NaiveTime::MIN);
        time.date().and_time(start)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn bucket_start_floors_minutes() {
        assert_eq!(Timeframe::M5.bucket_start(at(9, 17, 42)), at(9, 15, 0));
        assert_eq!(Timeframe::M5.bucket_start(at(9, 15, 0)), at(9, 15, 0));
        assert_eq!(Timeframe::M15.bucket_start(at(9, 29, 59)), at(9, 15, 0));
        assert_eq!(Timeframe::M15.bucket_start(at(10, 0, 1)), at(10, 0, 0));
    }

    #[test]
    fn validity() {
        assert!(Timeframe::M5.is_valid());
        assert!(Timeframe::from_minutes(60).is_valid());
        assert!(!Timeframe::from_minutes(0).is_valid());
        assert!(!Timeframe::from_minutes(7).is_valid());
    }

    #[test]
    fn displays_with_unit() {
        assert_eq!(Timeframe::M15.to_string(), "15m");
    }
}
