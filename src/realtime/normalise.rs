// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Turns loosely-typed upstream sightings into [`TrainSighting`] / [`StationSighting`].
//! Every field alias the upstream has used lives here and nowhere else.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::HOME_CARRIER;
use crate::schedule::SECONDS_PER_DAY;
use crate::station_time::ServiceDay;

const TRAIN_STATUS_KEYS: [&str; 3] = ["status", "train_status", "trainStatus"];
const CURRENT_STATUS_KEYS: [&str; 1] = ["currentStatus"];
const SERVICE_NAME_KEYS: [&str; 4] = ["routeName", "route", "name", "line"];
const STATION_NAME_KEYS: [&str; 2] = ["name", "station"];
const STATION_STATUS_KEYS: [&str; 2] = ["status", "stationStatus"];
const ARRIVED_KEYS: [&str; 2] = ["arrived", "hasArrived"];
const DEPARTED_KEYS: [&str; 2] = ["departed", "hasDeparted"];

struct TimeKeys {
    actual: &'static [&'static str],
    estimated: &'static [&'static str],
    scheduled: &'static [&'static str],
    running: &'static [&'static str],
}

const ARRIVAL_KEYS: TimeKeys = TimeKeys {
    actual: &["arr_actual", "arrActual", "arrivalActual", "actualArrival"],
    estimated: &["arr_est", "arrEst", "arrivalEstimated", "estimatedArrival"],
    scheduled: &["schArr", "arr_sch", "arrSch", "arrivalScheduled", "scheduledArrival"],
    running: &["arr"],
};

const DEPARTURE_KEYS: TimeKeys = TimeKeys {
    actual: &["dep_actual", "depActual", "departureActual", "actualDeparture"],
    estimated: &["dep_est", "depEst", "departureEstimated", "estimatedDeparture"],
    scheduled: &["schDep", "dep_sch", "depSch", "departureScheduled", "scheduledDeparture"],
    running: &["dep"],
};

const NAIVE_FORMATS: [&str; 9] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y, %I:%M:%S %p",
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimePoints {
    pub actual: Option<DateTime<Utc>>,
    pub estimated: Option<DateTime<Utc>>,
    pub scheduled: Option<DateTime<Utc>>,
    /// The `arr` / `dep` running time the tracker shows riders.
    pub running: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StationSighting {
    /// Upper-cased station code.
    pub code: String,
    /// Display name the feed gives the stop, if any.
    pub name: Option<String>,
    /// Verbatim station status (`Departed`, `Station`, `Enroute`, ...).
    pub status: Option<String>,
    pub arrived: bool,
    pub departed: bool,
    pub arrival: TimePoints,
    pub departure: TimePoints,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainSighting {
    pub provider: Option<String>,
    pub status: Option<String>,
    /// Running-state text some providers send instead of `status`.
    pub current_status: Option<String>,
    pub service_name: Option<String>,
    pub stations: Vec<StationSighting>,
}

impl TrainSighting {
    /// Named service the train runs as, `Amtrak` when the feed gives none.
    pub fn service_label(&self) -> &str {
        self.service_name.as_deref().unwrap_or(HOME_CARRIER)
    }

    pub fn station(&self, code: &str) -> Option<&StationSighting> {
        self.stations
            .iter()
            .find(|s| s.code.eq_ignore_ascii_case(code.trim()))
    }
}

/// Numbers below this are seconds past local midnight, not epoch times.
const SERVICE_SECONDS_LIMIT: f64 = (2 * SECONDS_PER_DAY) as f64;

/// Second-of-day on `day`, epoch seconds, epoch milliseconds, RFC 3339 / RFC 2822 or a
/// naive local time in the day's zone.
pub fn parse_timestamp(value: &Value, day: ServiceDay) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let x = n.as_f64()?;
            if (0.0..SERVICE_SECONDS_LIMIT).contains(&x) {
                Some(day.instant(x.round() as u32))
            } else {
                from_epoch(x)
            }
        }
        Value::String(s) => parse_time_str(s.trim(), day),
        _ => None,
    }
}

fn from_epoch(x: f64) -> Option<DateTime<Utc>> {
    if !x.is_finite() {
        return None;
    }
    let millis = if x.abs() >= 1e12 { x } else { x * 1000.0 };
    DateTime::from_timestamp_millis(millis.round() as i64)
}

fn parse_time_str(s: &str, day: ServiceDay) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(s, fmt).ok()?;
        day.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}

fn first_text(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

fn any_true(object: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| object.get(*key).and_then(Value::as_bool) == Some(true))
}

fn first_time(object: &Value, keys: &[&str], day: ServiceDay) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| parse_timestamp(value, day))
}

fn time_points(object: &Value, keys: &TimeKeys, day: ServiceDay) -> TimePoints {
    TimePoints {
        actual: first_time(object, keys.actual, day),
        estimated: first_time(object, keys.estimated, day),
        scheduled: first_time(object, keys.scheduled, day),
        running: first_time(object, keys.running, day),
    }
}

pub fn normalise_station(record: &Value, day: ServiceDay) -> Option<StationSighting> {
    if !record.is_object() {
        return None;
    }

    let code = ["code", "stationCode", "station"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .unwrap_or("")
        .trim()
        .to_ascii_uppercase();

    Some(StationSighting {
        code,
        name: first_text(record, &STATION_NAME_KEYS).map(|name| name.trim().to_string()),
        status: STATION_STATUS_KEYS
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        arrived: any_true(record, &ARRIVED_KEYS),
        departed: any_true(record, &DEPARTED_KEYS),
        arrival: time_points(record, &ARRIVAL_KEYS, day),
        departure: time_points(record, &DEPARTURE_KEYS, day),
    })
}

impl StationSighting {
    /// Provider status string, when it carries any text.
    pub fn status_text(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Trimmed status, empty when the feed sent none.
    pub fn status_trimmed(&self) -> &str {
        self.status.as_deref().map(str::trim).unwrap_or("")
    }

    /// Running time for the next move: departure, then arrival, then the scheduled ones.
    pub fn best_time(&self) -> Option<DateTime<Utc>> {
        self.departure
            .running
            .or(self.arrival.running)
            .or(self.departure.scheduled)
            .or(self.arrival.scheduled)
    }
}

/// Naive timestamps and bare seconds are read on `day`, in the zone of the station the
/// board is for.
pub fn normalise_sighting(sighting: &Value, day: ServiceDay) -> Option<TrainSighting> {
    if !sighting.is_object() {
        return None;
    }

    let stations = sighting
        .get("stations")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|record| normalise_station(record, day))
                .collect()
        })
        .unwrap_or_default();

    Some(TrainSighting {
        provider: sighting
            .get("provider")
            .and_then(Value::as_str)
            .map(str::to_string),
        status: first_text(sighting, &TRAIN_STATUS_KEYS),
        current_status: first_text(sighting, &CURRENT_STATUS_KEYS),
        service_name: first_text(sighting, &SERVICE_NAME_KEYS).map(|name| name.trim().to_string()),
        stations,
    })
}

/// The home carrier's sighting when there is one, else the first.
pub fn choose_sighting(sightings: &[Value]) -> Option<&Value> {
    sightings
        .iter()
        .find(|s| {
            s.get("provider")
                .and_then(Value::as_str)
                .is_some_and(|p| p.eq_ignore_ascii_case(HOME_CARRIER))
        })
        .or_else(|| sightings.first())
}
