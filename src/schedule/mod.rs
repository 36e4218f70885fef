// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Static schedule tables: stops, trip metadata, the service-date calendar and
//! per-station stop events. Loaded once, then only read.

pub mod loader;

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::non_blank;

pub type StationCode = CompactString;

pub const SECONDS_PER_DAY: u32 = 86_400;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(skip)]
    pub id: StationCode,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
}

impl Stop {
    /// Rider-facing name, falling back to the station code.
    pub fn display_name(&self) -> &str {
        non_blank(self.name.as_deref()).unwrap_or(self.id.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripMeta {
    #[serde(rename = "svc", default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(rename = "rl", default, skip_serializing_if = "Option::is_none")]
    pub route_long_name: Option<String>,
    #[serde(rename = "rs", default, skip_serializing_if = "Option::is_none")]
    pub route_short_name: Option<String>,
    #[serde(rename = "ts", default, skip_serializing_if = "Option::is_none")]
    pub train_number: Option<String>,
    #[serde(rename = "hd", default, skip_serializing_if = "Option::is_none")]
    pub headsign: Option<String>,
}

impl TripMeta {
    /// Route label shown in the "Train" column.
    pub fn route_label(&self) -> &str {
        non_blank(self.route_long_name.as_deref())
            .or_else(|| non_blank(self.route_short_name.as_deref()))
            .unwrap_or("Train")
    }

    /// Train number shown in the "No." column, also the realtime lookup key.
    pub fn display_train_number(&self) -> &str {
        non_blank(self.train_number.as_deref())
            .or_else(|| non_blank(self.route_short_name.as_deref()))
            .unwrap_or("--")
    }

    pub fn headsign(&self) -> Option<&str> {
        non_blank(self.headsign.as_deref())
    }

    /// Route name used by region allow-lists: the long name when set, else the short one.
    pub fn filter_route_name(&self) -> &str {
        self.route_long_name
            .as_deref()
            .filter(|x| !x.is_empty())
            .or(self.route_short_name.as_deref())
            .unwrap_or("")
            .trim()
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref().filter(|x| !x.is_empty())
    }
}

/// One `(arrival, departure, trip)` triple at a station.
///
/// Seconds count from local midnight of the trip's service day and may run past
/// 86400 for next-day continuations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopEvent {
    pub arrival: Option<u32>,
    pub departure: Option<u32>,
    pub trip_id: String,
}

impl StopEvent {
    pub fn new(arrival: Option<u32>, departure: Option<u32>, trip_id: impl Into<String>) -> Self {
        Self {
            arrival,
            departure,
            trip_id: trip_id.into(),
        }
    }

    /// Earliest of arrival and departure, if either is known.
    pub fn earliest_time(&self) -> Option<u32> {
        match (self.arrival, self.departure) {
            (Some(a), Some(d)) => Some(a.min(d)),
            (a, d) => a.or(d),
        }
    }
}

impl Serialize for StopEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.arrival)?;
        tuple.serialize_element(&self.departure)?;
        tuple.serialize_element(&self.trip_id)?;
        tuple.end()
    }
}

/// Station code -> events, kept in the order stations appear in `stop_events.json`.
///
/// Trip origin ties are broken by this order, so it must survive loading and filtering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StationEvents {
    entries: Vec<(StationCode, Vec<StopEvent>)>,
    index: AHashMap<StationCode, usize>,
}

impl StationEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the events of a known station in place, otherwise appends it.
    pub fn insert(&mut self, code: StationCode, events: Vec<StopEvent>) {
        match self.index.get(&code) {
            Some(&i) => self.entries[i].1 = events,
            None => {
                self.index.insert(code.clone(), self.entries.len());
                self.entries.push((code, events));
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&Vec<StopEvent>> {
        self.index.get(code).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Vec<StopEvent>> {
        match self.index.get(code) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains_key(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StationCode, &Vec<StopEvent>)> {
        self.entries.iter().map(|(code, events)| (code, events))
    }

    pub fn values(&self) -> impl Iterator<Item = &Vec<StopEvent>> {
        self.entries.iter().map(|(_, events)| events)
    }
}

impl FromIterator<(StationCode, Vec<StopEvent>)> for StationEvents {
    fn from_iter<I: IntoIterator<Item = (StationCode, Vec<StopEvent>)>>(iter: I) -> Self {
        let mut out = StationEvents::new();
        for (code, events) in iter {
            out.insert(code, events);
        }
        out
    }
}

impl IntoIterator for StationEvents {
    type Item = (StationCode, Vec<StopEvent>);
    type IntoIter = std::vec::IntoIter<(StationCode, Vec<StopEvent>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for StationEvents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, events) in &self.entries {
            map.serialize_entry(code, events)?;
        }
        map.end()
    }
}

pub fn day_offset(seconds: u32) -> u32 {
    seconds / SECONDS_PER_DAY
}

/// `YYYYMMDD` -> service ids running that day.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ServiceCalendar {
    pub dates: BTreeMap<String, Vec<String>>,
}

impl ServiceCalendar {
    pub fn active_services(&self, date_key: &str) -> AHashSet<&str> {
        self.dates
            .get(date_key)
            .map(|services| services.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleStore {
    pub stops: BTreeMap<StationCode, Stop>,
    pub trips: BTreeMap<String, TripMeta>,
    pub calendar: ServiceCalendar,
    pub stop_events: StationEvents,
}

impl ScheduleStore {
    pub fn stop(&self, code: &str) -> Option<&Stop> {
        self.stops.get(code)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TripMeta> {
        self.trips.get(trip_id)
    }

    pub fn events_at(&self, code: &str) -> &[StopEvent] {
        self.stop_events
            .get(code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Stations sorted by display name, the order used by station pickers.
    pub fn stations_by_name(&self) -> Vec<&Stop> {
        let mut stations: Vec<&Stop> = self.stops.values().collect();
        stations.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        stations
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_label_falls_back_to_short_name_then_train() {
        let mut meta = TripMeta {
            route_long_name: Some("  ".into()),
            route_short_name: Some("NER".into()),
            ..Default::default()
        };
        assert_eq!(meta.route_label(), "NER");
        meta.route_short_name = None;
        assert_eq!(meta.route_label(), "Train");
    }

    #[test]
    fn train_number_falls_back_to_short_name_then_dashes() {
        let mut meta = TripMeta {
            train_number: Some(" 2151 ".into()),
            route_short_name: Some("Acela".into()),
            ..Default::default()
        };
        assert_eq!(meta.display_train_number(), "2151");
        meta.train_number = Some("".into());
        assert_eq!(meta.display_train_number(), "Acela");
        meta.route_short_name = None;
        assert_eq!(meta.display_train_number(), "--");
    }

    #[test]
    fn stop_event_serialises_as_triple() {
        let event = StopEvent::new(None, Some(43_200), "T1");
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"[null,43200,"T1"]"#
        );
    }

    #[test]
    fn earliest_time_treats_missing_as_infinite() {
        assert_eq!(StopEvent::new(Some(500), Some(520), "x").earliest_time(), Some(500));
        assert_eq!(StopEvent::new(None, Some(30), "x").earliest_time(), Some(30));
        assert_eq!(StopEvent::new(None, None, "x").earliest_time(), None);
    }

    #[test]
    fn station_events_keep_insertion_order() {
        let mut events = StationEvents::new();
        events.insert("WAS".into(), vec![StopEvent::new(None, Some(100), "T")]);
        events.insert("BAL".into(), vec![]);
        events.insert("WAS".into(), vec![StopEvent::new(None, Some(200), "T")]);

        let codes: Vec<&str> = events.iter().map(|(code, _)| code.as_str()).collect();
        assert_eq!(codes, vec!["WAS", "BAL"]);
        assert_eq!(events.get("WAS").unwrap()[0].departure, Some(200));
        assert_eq!(
            serde_json::to_string(&events).unwrap(),
            r#"{"WAS":[[null,200,"T"]],"BAL":[]}"#
        );
    }

    #[test]
    fn absent_calendar_date_is_empty() {
        let store = test_fixtures::small_store();
        assert!(store.calendar.active_services("20990101").is_empty());
        assert!(store.calendar.active_services("20240601").contains("WKD"));
    }
}
