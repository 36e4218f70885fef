// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use crate::realtime::feed::RawTrainFeed;
use crate::schedule::{ScheduleStore, ServiceCalendar};

pub const NEC_STATIONS: [&str; 31] = [
    "BOS", "BBY", "RTE", "PVD", "KIN", "WLY", "MYS", "NLC", "OSB", "NHV", "BRP", "STM", "NRO",
    "NYP", "NWK", "EWR", "MET", "NBK", "PJC", "TRE", "CWH", "PHN", "PHL", "WIL", "NRK", "ABD",
    "EDW", "BWI", "BAL", "NCR", "WAS",
];

pub const NEC_ROUTES: [&str; 10] = [
    "Acela",
    "Northeast Regional",
    "Keystone Service",
    "Cardinal",
    "Carolinian",
    "Crescent",
    "Palmetto",
    "Silver Meteor",
    "Silver Star",
    "Vermonter",
];

/// (min_lat, max_lat, min_lon, max_lon)
pub const NEC_BBOX: (f64, f64, f64, f64) = (38.0, 43.6, -77.6, -70.5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    #[serde(alias = "nec")]
    NortheastCorridor,
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nec" | "northeast-corridor" => Ok(Region::NortheastCorridor),
            other => Err(format!("unknown region '{}'", other)),
        }
    }
}

impl Region {
    pub const ALL: [Region; 1] = [Region::NortheastCorridor];

    /// Short tag as written in account filters.
    pub fn tag(&self) -> &'static str {
        match self {
            Region::NortheastCorridor => "nec",
        }
    }

    /// Unknown tags mean "no filter".
    pub fn from_tag(tag: Option<&str>) -> Option<Region> {
        tag.and_then(|t| t.parse().ok())
    }

    pub fn stations(&self) -> &'static [&'static str] {
        match self {
            Region::NortheastCorridor => &NEC_STATIONS,
        }
    }

    pub fn routes(&self) -> &'static [&'static str] {
        match self {
            Region::NortheastCorridor => &NEC_ROUTES,
        }
    }

    pub fn allows_station(&self, code: &str) -> bool {
        let code = code.to_ascii_uppercase();
        self.stations().contains(&code.as_str())
    }

    pub fn allows_route_name(&self, route_name: &str) -> bool {
        let route_name = route_name.trim();
        self.routes()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(route_name))
    }

    fn route_name_hinted(&self, route_name: &str) -> bool {
        let route_name = route_name.to_lowercase();
        self.routes()
            .iter()
            .any(|allowed| route_name.contains(&allowed.to_lowercase()))
    }

    fn contains_point(&self, lat: f64, lon: f64) -> bool {
        match self {
            Region::NortheastCorridor => {
                let (min_lat, max_lat, min_lon, max_lon) = NEC_BBOX;
                (min_lat..=max_lat).contains(&lat) && (min_lon..=max_lon).contains(&lon)
            }
        }
    }
}

/// Restricts all four schedule tables to `region`, keeping them consistent with each
/// other. `None` returns the store unchanged.
pub fn apply_region_filter(store: ScheduleStore, region: Option<Region>) -> ScheduleStore {
    let Some(region) = region else {
        return store;
    };

    let mut store = store;

    store.stops = store
        .stops
        .into_iter()
        .filter(|(code, _)| region.allows_station(code))
        .collect();

    store.trips = store
        .trips
        .into_iter()
        .filter(|(_, meta)| region.allows_route_name(meta.filter_route_name()))
        .collect();

    let trips_to_keep: AHashSet<&str> = store.trips.keys().map(String::as_str).collect();

    store.stop_events = store
        .stop_events
        .into_iter()
        .filter(|(code, _)| region.allows_station(code))
        .map(|(code, events)| {
            let events = events
                .into_iter()
                .filter(|event| trips_to_keep.contains(event.trip_id.as_str()))
                .collect();
            (code, events)
        })
        .collect();

    let services_to_keep: BTreeSet<&str> = store
        .trips
        .values()
        .filter_map(|meta| meta.service_id())
        .collect();

    let dates = store
        .calendar
        .dates
        .into_iter()
        .map(|(date_key, services)| {
            let services = services
                .into_iter()
                .filter(|service| services_to_keep.contains(service.as_str()))
                .collect();
            (date_key, services)
        })
        .collect();

    store.calendar = ServiceCalendar { dates };

    store
}

/// The full schedule plus one pre-filtered copy per region, built once per load.
#[derive(Debug, Default)]
pub struct RegionalSchedules {
    full: Arc<ScheduleStore>,
    regional: BTreeMap<Region, Arc<ScheduleStore>>,
}

impl RegionalSchedules {
    pub fn new(full: ScheduleStore) -> Self {
        let regional = Region::ALL
            .iter()
            .map(|region| {
                (
                    *region,
                    Arc::new(apply_region_filter(full.clone(), Some(*region))),
                )
            })
            .collect();

        Self {
            full: Arc::new(full),
            regional,
        }
    }

    pub fn for_region(&self, region: Option<Region>) -> Arc<ScheduleStore> {
        region
            .and_then(|region| self.regional.get(&region))
            .unwrap_or(&self.full)
            .clone()
    }
}

fn str_field<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| object.get(*key).and_then(Value::as_str))
}

fn f64_field(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let value = object.get(*key)?;
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

fn mentions_station(region: Region, sighting: &Value) -> bool {
    const SINGLE_KEYS: [&str; 10] = [
        "station",
        "stationCode",
        "code",
        "from",
        "to",
        "origin",
        "destination",
        "nextStation",
        "prevStation",
        "lastStation",
    ];

    if SINGLE_KEYS
        .iter()
        .filter_map(|key| sighting.get(*key).and_then(Value::as_str))
        .any(|code| region.stations().contains(&code))
    {
        return true;
    }

    ["stations", "stops", "routeStations"]
        .iter()
        .filter_map(|key| sighting.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(|item| match item {
            Value::String(code) => Some(code.as_str()),
            Value::Object(_) => str_field(item, &["code", "stationCode", "station"]),
            _ => None,
        })
        .any(|code| region.stations().contains(&code))
}

fn keep_sighting(region: Region, sighting: &Value) -> bool {
    if !sighting.is_object() {
        return false;
    }

    if let Some(route_name) = str_field(sighting, &["routeName", "route", "service"]) {
        if region.route_name_hinted(route_name) {
            return true;
        }
    }

    if mentions_station(region, sighting) {
        return true;
    }

    match (
        f64_field(sighting, &["lat", "latitude"]),
        f64_field(sighting, &["lon", "lng", "longitude"]),
    ) {
        (Some(lat), Some(lon)) => region.contains_point(lat, lon),
        _ => false,
    }
}

/// Region filter for the raw train feed served by the realtime proxy.
pub fn filter_realtime_trains(feed: RawTrainFeed, region: Option<Region>) -> RawTrainFeed {
    let Some(region) = region else {
        return feed;
    };

    feed.into_iter()
        .filter_map(|(train_number, sightings)| {
            let sightings: Vec<Value> = sightings
                .into_iter()
                .filter(|sighting| keep_sighting(region, sighting))
                .collect();
            (!sightings.is_empty()).then_some((train_number, sightings))
        })
        .collect()
}

/// Region filter for the raw stations feed (object keyed by code, or a list of records).
pub fn filter_realtime_stations(payload: Value, region: Option<Region>) -> Value {
    let Some(region) = region else {
        return payload;
    };

    match payload {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(code, _)| region.allows_station(code))
                .collect(),
        ),
        Value::Array(list) => Value::Array(
            list.into_iter()
                .filter(|record| {
                    str_field(record, &["code", "stationCode", "id"])
                        .is_some_and(|code| region.allows_station(code))
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::test_fixtures::{small_store, trip};
    use crate::schedule::StopEvent;
    use serde_json::json;

    #[test]
    fn no_region_is_identity() {
        let store = small_store();
        assert_eq!(apply_region_filter(store.clone(), None), store);
        assert_eq!(Region::from_tag(Some("pacific-surfliner")), None);
        assert_eq!(Region::from_tag(None), None);
        assert_eq!(Region::from_tag(Some(Region::NortheastCorridor.tag())), Some(Region::NortheastCorridor));
    }

    #[test]
    fn region_tags_accept_alias() {
        assert_eq!(Region::from_tag(Some("nec")), Some(Region::NortheastCorridor));
        assert_eq!(
            Region::from_tag(Some("Northeast-Corridor")),
            Some(Region::NortheastCorridor)
        );
    }

    #[test]
    fn nec_filter_drops_off_corridor_stations_and_routes() {
        let filtered = apply_region_filter(small_store(), Some(Region::NortheastCorridor));

        assert!(filtered.stop("NYP").is_some());
        assert!(filtered.stop("CHI").is_none());
        assert!(filtered.trip("T1").is_some());
        assert!(filtered.trip("T3").is_none());
        assert!(!filtered.stop_events.contains_key("CHI"));
        assert!(
            filtered
                .events_at("NYP")
                .iter()
                .all(|event| event.trip_id != "T3")
        );
        assert_eq!(filtered.calendar.dates["20240601"], vec!["WKD".to_string()]);
    }

    #[test]
    fn route_match_is_case_insensitive_and_uses_short_name_fallback() {
        let mut store = small_store();
        let mut meta = trip("WKD", "", "99", "Boston");
        meta.route_short_name = Some("  acela ".into());
        store.trips.insert("T9".into(), meta);

        let filtered = apply_region_filter(store, Some(Region::NortheastCorridor));
        assert!(filtered.trip("T9").is_some());
    }

    #[test]
    fn filtered_tables_stay_closed() {
        let mut store = small_store();
        store
            .stop_events
            .get_mut("NYP")
            .unwrap()
            .push(StopEvent::new(None, Some(1_000), "DANGLING"));
        store.calendar.dates.insert("20240602".into(), vec!["GHOST".into(), "DAILY".into()]);

        let filtered = apply_region_filter(store, Some(Region::NortheastCorridor));

        for events in filtered.stop_events.values() {
            for event in events {
                assert!(filtered.trips.contains_key(&event.trip_id));
            }
        }

        let referenced: BTreeSet<&str> =
            filtered.trips.values().filter_map(|m| m.service_id()).collect();
        for services in filtered.calendar.dates.values() {
            for service in services {
                assert!(referenced.contains(service.as_str()));
            }
        }
    }

    #[test]
    fn regional_schedules_hand_out_filtered_copies() {
        let schedules = RegionalSchedules::new(small_store());
        assert!(schedules.for_region(None).stop("CHI").is_some());
        assert!(
            schedules
                .for_region(Some(Region::NortheastCorridor))
                .stop("CHI")
                .is_none()
        );
    }

    #[test]
    fn realtime_trains_filtered_by_route_station_or_bbox() {
        let feed: RawTrainFeed = serde_json::from_value(json!({
            "2151": [{"routeName": "Acela", "stations": []}],
            "49": [{"routeName": "Lake Shore Limited", "stations": [{"code": "CHI"}]}],
            "448": [{"routeName": "Lake Shore Limited", "stations": [{"code": "BOS"}]}],
            "9": [{"routeName": "Mystery", "lat": 40.75, "lon": -73.99}]
        }))
        .unwrap();

        let filtered = filter_realtime_trains(feed, Some(Region::NortheastCorridor));
        assert!(filtered.contains_key("2151"));
        assert!(!filtered.contains_key("49"));
        assert!(filtered.contains_key("448"));
        assert!(filtered.contains_key("9"));
    }

    #[test]
    fn realtime_stations_filtered() {
        let filtered = filter_realtime_stations(
            json!({"NYP": {"name": "New York"}, "CHI": {"name": "Chicago"}}),
            Some(Region::NortheastCorridor),
        );
        assert!(filtered.get("NYP").is_some());
        assert!(filtered.get("CHI").is_none());

        let filtered = filter_realtime_stations(
            json!([{"code": "WAS"}, {"code": "LAX"}]),
            Some(Region::NortheastCorridor),
        );
        assert_eq!(filtered.as_array().unwrap().len(), 1);
    }
}
