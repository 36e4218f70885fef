// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kv_store::{KeyValueStore, StoreError, get_json, set_json};
use crate::non_blank;

pub const OVERRIDES_KEY: &str = "amtrak_board_overrides_v4";

/// Gate, track and status typed in by station staff for one trip on one date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    #[serde(default)]
    pub gate: String,
    #[serde(default)]
    pub track: String,
    #[serde(default)]
    pub status: String,
}

impl Override {
    pub fn trimmed(self) -> Self {
        Self {
            gate: self.gate.trim().to_string(),
            track: self.track.trim().to_string(),
            status: self.status.trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        [&self.gate, &self.track, &self.status]
            .iter()
            .all(|x| x.trim().is_empty())
    }

    pub fn gate(&self) -> Option<&str> {
        non_blank(Some(&self.gate))
    }

    pub fn track(&self) -> Option<&str> {
        non_blank(Some(&self.track))
    }

    pub fn status(&self) -> Option<&str> {
        non_blank(Some(&self.status))
    }
}

pub type OverrideMap = BTreeMap<String, Override>;

/// `20240601|NYP|T1`
pub fn override_key(date_key: &str, station: &str, trip_id: &str) -> String {
    format!("{}|{}|{}", date_key, station, trip_id)
}

/// All overrides live in one JSON object under [`OVERRIDES_KEY`].
#[derive(Clone)]
pub struct OverrideStore {
    store: Arc<dyn KeyValueStore>,
}

impl OverrideStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn all(&self) -> OverrideMap {
        get_json(self.store.as_ref(), OVERRIDES_KEY).unwrap_or_default()
    }

    pub fn get(&self, date_key: &str, station: &str, trip_id: &str) -> Option<Override> {
        self.all().remove(&override_key(date_key, station, trip_id))
    }

    /// Stores the trimmed override, or removes the entry when every field is blank.
    pub fn set(
        &self,
        date_key: &str,
        station: &str,
        trip_id: &str,
        value: Override,
    ) -> Result<(), StoreError> {
        let key = override_key(date_key, station, trip_id);
        let value = value.trimmed();
        let mut overrides = self.all();

        if value.is_blank() {
            if overrides.remove(&key).is_none() {
                return Ok(());
            }
        } else {
            overrides.insert(key, value);
        }

        set_json(self.store.as_ref(), OVERRIDES_KEY, &overrides)
    }

    pub fn delete(&self, date_key: &str, station: &str, trip_id: &str) -> Result<(), StoreError> {
        self.set(date_key, station, trip_id, Override::default())
    }
}
