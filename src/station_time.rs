// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Station-local time: zone resolution, second-of-day arithmetic and board labels.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::schedule::{SECONDS_PER_DAY, Stop, day_offset};

/// Zone used when a station has no usable longitude.
pub const DEFAULT_STATION_TZ: Tz = chrono_tz::America::New_York;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant. Used by `larch board --at` and the tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Coarse longitude banding. Not a zone database lookup; keep all callers on this
/// function so it can be swapped for one.
pub fn time_zone_for_longitude(lon: Option<f64>) -> Tz {
    match lon {
        Some(lon) if lon.is_finite() => {
            if lon <= -115.0 {
                chrono_tz::America::Los_Angeles
            } else if lon <= -105.0 {
                chrono_tz::America::Denver
            } else if lon <= -90.0 {
                chrono_tz::America::Chicago
            } else {
                chrono_tz::America::New_York
            }
        }
        _ => DEFAULT_STATION_TZ,
    }
}

pub fn resolve_station_time_zone(stop: Option<&Stop>) -> Tz {
    time_zone_for_longitude(stop.and_then(|s| s.lon))
}

pub fn second_of_day(instant: DateTime<Utc>, tz: Tz) -> u32 {
    instant.with_timezone(&tz).num_seconds_from_midnight()
}

pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

fn twelve_hour(hour24: u32) -> u32 {
    ((hour24 + 11) % 12) + 1
}

/// Second-of-day -> `12:00p` / `7:05a`. Next-day continuations render as `--`.
pub fn board_time_label(seconds: Option<u32>) -> String {
    let Some(seconds) = seconds else {
        return "--".to_string();
    };

    if day_offset(seconds) > 0 {
        return "--".to_string();
    }

    let s = seconds % SECONDS_PER_DAY;
    let hour24 = s / 3600;
    let minute = (s % 3600) / 60;
    let suffix = if hour24 >= 12 { "p" } else { "a" };

    format!("{}:{:02}{}", twelve_hour(hour24), minute, suffix)
}

/// Instant -> `7:42p` in the station's zone.
pub fn short_time_label(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let suffix = if local.hour() >= 12 { "p" } else { "a" };
    format!("{}:{:02}{}", twelve_hour(local.hour()), local.minute(), suffix)
}

/// Header clock, `7:42 PM`.
pub fn clock_label(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    let suffix = if local.hour() >= 12 { "PM" } else { "AM" };
    format!("{}:{:02} {}", twelve_hour(local.hour()), local.minute(), suffix)
}

/// Local midnight of `date` in `tz` plus `seconds`. Falls back to UTC midnight when the
/// local midnight does not exist.
pub fn instant_from_service_seconds(date: NaiveDate, seconds: u32, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let base = tz
        .from_local_datetime(&midnight)
        .earliest()
        .map(|x| x.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));
    base + chrono::Duration::seconds(i64::from(seconds))
}

/// The station-local day a bare second-of-day count is read against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServiceDay {
    pub date: NaiveDate,
    pub tz: Tz,
}

impl ServiceDay {
    /// The local day `now` falls on in `tz`.
    pub fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        ServiceDay {
            date: local_date(now, tz),
            tz,
        }
    }

    pub fn instant(&self, seconds: u32) -> DateTime<Utc> {
        instant_from_service_seconds(self.date, seconds, self.tz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_bands() {
        assert_eq!(time_zone_for_longitude(Some(-73.99)), chrono_tz::America::New_York);
        // the Central band starts at -90, so Chicago itself reads as Eastern
        assert_eq!(time_zone_for_longitude(Some(-87.64)), chrono_tz::America::New_York);
        assert_eq!(time_zone_for_longitude(Some(-90.0)), chrono_tz::America::Chicago);
        assert_eq!(time_zone_for_longitude(Some(-93.27)), chrono_tz::America::Chicago);
        assert_eq!(time_zone_for_longitude(Some(-104.99)), chrono_tz::America::Chicago);
        assert_eq!(time_zone_for_longitude(Some(-105.0)), chrono_tz::America::Denver);
        assert_eq!(time_zone_for_longitude(Some(-118.24)), chrono_tz::America::Los_Angeles);
        assert_eq!(time_zone_for_longitude(None), DEFAULT_STATION_TZ);
        assert_eq!(time_zone_for_longitude(Some(f64::NAN)), DEFAULT_STATION_TZ);
    }

    #[test]
    fn board_labels() {
        assert_eq!(board_time_label(Some(43_200)), "12:00p");
        assert_eq!(board_time_label(Some(0)), "12:00a");
        assert_eq!(board_time_label(Some(7 * 3600 + 5 * 60)), "7:05a");
        assert_eq!(board_time_label(Some(23 * 3600 + 59 * 60 + 59)), "11:59p");
        assert_eq!(board_time_label(Some(SECONDS_PER_DAY + 60)), "--");
        assert_eq!(board_time_label(None), "--");
    }

    #[test]
    fn second_of_day_uses_station_zone() {
        // 15:50 UTC is 11:50 in New York during daylight time
        let instant = Utc.with_ymd_and_hms(2024, 6, 1, 15, 50, 0).unwrap();
        assert_eq!(second_of_day(instant, chrono_tz::America::New_York), 42_600);
        assert_eq!(second_of_day(instant, chrono_tz::America::Chicago), 42_600 - 3600);
    }

    #[test]
    fn short_and_clock_labels() {
        let instant = Utc.with_ymd_and_hms(2024, 6, 1, 23, 42, 0).unwrap();
        assert_eq!(short_time_label(instant, chrono_tz::America::New_York), "7:42p");
        assert_eq!(clock_label(instant, chrono_tz::America::New_York), "7:42 PM");
    }

    #[test]
    fn service_seconds_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let instant = instant_from_service_seconds(date, 43_200, chrono_tz::America::New_York);
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 6, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn service_day_uses_the_local_date() {
        // 01:30 UTC on June 2 is still June 1 in New York
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 1, 30, 0).unwrap();
        let day = ServiceDay::containing(now, chrono_tz::America::New_York);

        assert_eq!(day.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(
            day.instant(43_200),
            Utc.with_ymd_and_hms(2024, 6, 1, 16, 0, 0).unwrap()
        );
    }
}
