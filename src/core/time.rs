//! Reusable timezone-aware calendar arithmetic.
//!
//! Schedule times are seconds into the service day and can exceed 24 hours
//! for trips running past midnight, so everything that converts between
//! epoch time and service-day time goes through this helper with the
//! agency's resolved timezone, never through the machine's local zone.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub struct TimeHelper {
    tz: Tz,
}

impl TimeHelper {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Epoch milliseconds as a local datetime in the agency timezone.
    pub fn local(&self, epoch_ms: i64) -> DateTime<Tz> {
        DateTime::<Utc>::from_timestamp_millis(epoch_ms)
            .unwrap_or_default()
            .with_timezone(&self.tz)
    }

    /// The service date an epoch time falls on, in the agency timezone.
    pub fn service_date(&self, epoch_ms: i64) -> NaiveDate {
        self.local(epoch_ms).date_naive()
    }

    /// Epoch milliseconds of local midnight for the given date. Around DST
    /// transitions where midnight is skipped or repeated the earliest
    /// valid interpretation wins.
    pub fn start_of_day_ms(&self, date: NaiveDate) -> i64 {
        let midnight = date.and_time(NaiveTime::MIN);
        self.tz
            .from_local_datetime(&midnight)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&midnight))
            .timestamp_millis()
    }

    /// Seconds elapsed since local midnight of the epoch time's own
    /// service date.
    pub fn secs_into_day(&self, epoch_ms: i64) -> i64 {
        let start = self.start_of_day_ms(self.service_date(epoch_ms));
        (epoch_ms - start) / 1000
    }

    /// Format a time-of-day in seconds as HH:MM:SS. Handles schedule times
    /// past 24:00:00.
    pub fn format_time_of_day(secs: i64) -> String {
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        let s = secs % 60;
        format!("{h:02}:{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-15T20:00:00Z, which is 12:00 in Los Angeles (UTC-8).
    const NOON_LA_MS: i64 = 1_705_348_800_000;

    fn la() -> TimeHelper {
        TimeHelper::new(chrono_tz::America::Los_Angeles)
    }

    #[test]
    fn service_date_uses_agency_timezone() {
        // 2024-01-16T01:00:00Z is still Jan 15 in Los Angeles.
        let late_evening_ms = 1_705_366_800_000;
        assert_eq!(
            la().service_date(late_evening_ms),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        let utc = TimeHelper::new(chrono_tz::UTC);
        assert_eq!(
            utc.service_date(late_evening_ms),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }

    #[test]
    fn secs_into_day_measures_from_local_midnight() {
        assert_eq!(la().secs_into_day(NOON_LA_MS), 12 * 3600);
    }

    #[test]
    fn start_of_day_round_trips() {
        let time = la();
        let date = time.service_date(NOON_LA_MS);
        let start = time.start_of_day_ms(date);
        assert_eq!(time.service_date(start), date);
        assert_eq!(time.secs_into_day(start), 0);
    }

    #[test]
    fn formats_times_past_midnight() {
        assert_eq!(TimeHelper::format_time_of_day(0), "00:00:00");
        assert_eq!(TimeHelper::format_time_of_day(30_600), "08:30:00");
        assert_eq!(TimeHelper::format_time_of_day(91_800), "25:30:00");
        // A runaway playback clock can produce arbitrary second counts;
        // they must render without wrapping.
        assert_eq!(
            TimeHelper::format_time_of_day(i64::from(i32::MAX) + 3_600),
            "596524:14:07"
        );
    }
}
