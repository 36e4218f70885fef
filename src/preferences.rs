// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::board::BoardType;
use crate::kv_store::{KeyValueStore, StoreError, get_json, set_json};
use crate::schedule::ScheduleStore;

pub const PREFERENCES_KEY: &str = "amtrak_board_prefs_v4";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub station_id: Option<String>,
    pub board_type: BoardType,
    #[serde(rename = "dateISO")]
    pub date_iso: Option<String>,
    pub ticker: String,
}

impl Preferences {
    /// The saved station when it still exists, else Washington Union, else a New York
    /// station, else the first station by name.
    pub fn station_or_default(&self, schedule: &ScheduleStore) -> Option<String> {
        if let Some(saved) = self.station_id.as_deref() {
            if schedule.stop(saved).is_some() {
                return Some(saved.to_string());
            }
        }

        let stations = schedule.stations_by_name();
        let name_contains = |needle: &str| {
            stations
                .iter()
                .find(|stop| stop.display_name().to_lowercase().contains(needle))
                .map(|stop| stop.id.to_string())
        };

        name_contains("washington union")
            .or_else(|| name_contains("new york"))
            .or_else(|| stations.first().map(|stop| stop.id.to_string()))
    }
}

#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Unreadable or missing data yields defaults.
    pub fn load(&self) -> Preferences {
        get_json(self.store.as_ref(), PREFERENCES_KEY).unwrap_or_default()
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), PREFERENCES_KEY, preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::MemoryStore;
    use crate::schedule::test_fixtures::{small_store, stop};

    #[test]
    fn round_trips_through_store_with_camel_case_fields() {
        let kv = Arc::new(MemoryStore::new());
        let prefs = PreferenceStore::new(kv.clone());

        prefs
            .save(&Preferences {
                station_id: Some("NYP".into()),
                board_type: BoardType::Arrivals,
                date_iso: Some("2024-06-01".into()),
                ticker: "Mind the gap".into(),
            })
            .unwrap();

        let raw = kv.get(PREFERENCES_KEY).unwrap();
        assert!(raw.contains("\"stationId\":\"NYP\""));
        assert!(raw.contains("\"boardType\":\"arrivals\""));
        assert!(raw.contains("\"dateISO\":\"2024-06-01\""));

        assert_eq!(prefs.load().board_type, BoardType::Arrivals);
    }

    #[test]
    fn garbage_loads_defaults() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(PREFERENCES_KEY, "[]".into()).unwrap();
        assert_eq!(PreferenceStore::new(kv).load(), Preferences::default());
    }

    #[test]
    fn partial_blob_fills_defaults() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(PREFERENCES_KEY, r#"{"ticker":"hi","realtime":"on"}"#.into())
            .unwrap();
        let loaded = PreferenceStore::new(kv).load();
        assert_eq!(loaded.ticker, "hi");
        assert_eq!(loaded.board_type, BoardType::Departures);
    }

    #[test]
    fn station_default_prefers_washington_then_new_york() {
        let mut store = small_store();
        let prefs = Preferences::default();
        assert_eq!(prefs.station_or_default(&store).as_deref(), Some("NYP"));

        store.stops.extend([stop("WAS", "Washington Union Station", -77.0)]);
        assert_eq!(prefs.station_or_default(&store).as_deref(), Some("WAS"));

        let saved = Preferences {
            station_id: Some("BOS".into()),
            ..Default::default()
        };
        assert_eq!(saved.station_or_default(&store).as_deref(), Some("BOS"));
    }
}
