// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::{ScheduleStore, ServiceCalendar, StationCode, StationEvents, Stop, StopEvent, TripMeta};

pub const STOPS_FILE: &str = "stops.json";
pub const TRIPMAP_FILE: &str = "tripmap.json";
pub const SERVICES_BY_DATE_FILE: &str = "services_by_date.json";
pub const STOP_EVENTS_FILE: &str = "stop_events.json";

#[derive(Error, Debug)]
pub enum ScheduleLoadError {
    #[error("I/O error reading schedule table '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Schedule table '{path}' is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

async fn read_table(path: &Path) -> Result<Value, ScheduleLoadError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| ScheduleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| ScheduleLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the four tables from `dir`. A table that is missing or malformed is
/// logged and treated as empty.
pub async fn load_schedule_dir(dir: &Path) -> ScheduleStore {
    let stops_path = dir.join(STOPS_FILE);
    let trips_path = dir.join(TRIPMAP_FILE);
    let calendar_path = dir.join(SERVICES_BY_DATE_FILE);
    let events_path = dir.join(STOP_EVENTS_FILE);

    let (stops, trips, calendar, events) = tokio::join!(
        read_table(&stops_path),
        read_table(&trips_path),
        read_table(&calendar_path),
        read_table(&events_path),
    );

    let table_or_null = |table: Result<Value, ScheduleLoadError>| match table {
        Ok(value) => value,
        Err(err) => {
            warn!("{}", err);
            Value::Null
        }
    };

    let store = ScheduleStore::from_json_tables(
        &table_or_null(stops),
        &table_or_null(trips),
        &table_or_null(calendar),
        &table_or_null(events),
    );

    info!(
        "Loaded schedule from {}: {} stops, {} trips, {} calendar dates, {} stations with events",
        dir.display(),
        store.stops.len(),
        store.trips.len(),
        store.calendar.dates.len(),
        store.stop_events.len()
    );

    store
}

impl ScheduleStore {
    pub fn from_json_tables(stops: &Value, trips: &Value, calendar: &Value, events: &Value) -> Self {
        Self {
            stops: parse_stops(stops),
            trips: parse_trips(trips),
            calendar: parse_calendar(calendar),
            stop_events: parse_stop_events(events),
        }
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

fn value_to_seconds(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() || n < 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n.floor() as u32)
}

fn parse_stops(table: &Value) -> BTreeMap<StationCode, Stop> {
    let Some(object) = table.as_object() else {
        return BTreeMap::new();
    };

    object
        .iter()
        .map(|(code, raw)| {
            let stop = Stop {
                id: code.as_str().into(),
                name: raw.get("n").and_then(value_to_string),
                lon: raw.get("lon").and_then(value_to_f64),
                lat: raw.get("lat").and_then(value_to_f64),
            };
            (StationCode::from(code.as_str()), stop)
        })
        .collect()
}

fn parse_trips(table: &Value) -> BTreeMap<String, TripMeta> {
    let Some(object) = table.as_object() else {
        return BTreeMap::new();
    };

    object
        .iter()
        .filter(|(_, raw)| raw.is_object())
        .map(|(trip_id, raw)| {
            let field = |key: &str| raw.get(key).and_then(value_to_string);
            let meta = TripMeta {
                service_id: field("svc"),
                route_long_name: field("rl"),
                route_short_name: field("rs"),
                train_number: field("ts"),
                headsign: field("hd"),
            };
            (trip_id.clone(), meta)
        })
        .collect()
}

fn parse_calendar(table: &Value) -> ServiceCalendar {
    let Some(object) = table.as_object() else {
        return ServiceCalendar::default();
    };

    let dates = object
        .iter()
        .filter_map(|(date_key, services)| {
            let services = services
                .as_array()?
                .iter()
                .filter_map(value_to_string)
                .collect::<Vec<String>>();
            Some((date_key.clone(), services))
        })
        .collect();

    ServiceCalendar { dates }
}

/// Keeps stations in file order; `serde_json` is built with `preserve_order`.
fn parse_stop_events(table: &Value) -> StationEvents {
    let Some(object) = table.as_object() else {
        return StationEvents::new();
    };

    let mut out = StationEvents::new();

    for (code, events) in object {
        let Some(events) = events.as_array() else {
            continue;
        };

        let parsed = events
            .iter()
            .filter_map(|event| {
                let triple = event.as_array().filter(|x| x.len() >= 3)?;
                let trip_id = value_to_string(&triple[2])?;
                Some(StopEvent {
                    arrival: value_to_seconds(&triple[0]),
                    departure: value_to_seconds(&triple[1]),
                    trip_id,
                })
            })
            .collect::<Vec<StopEvent>>();

        out.insert(StationCode::from(code.as_str()), parsed);
    }

    out
}
