// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use serde_json::Value;
use std::collections::BTreeMap;

use super::RealtimeError;

/// Train number -> provider sightings, as served by the upstream tracker.
pub type RawTrainFeed = BTreeMap<String, Vec<Value>>;

/// Accepts the upstream object; entries whose value is not a list are dropped.
pub fn parse_train_feed(payload: Value) -> Result<RawTrainFeed, RealtimeError> {
    let Value::Object(map) = payload else {
        return Err(RealtimeError::UnexpectedShape("train feed is not an object"));
    };

    Ok(map
        .into_iter()
        .filter_map(|(train_number, sightings)| match sightings {
            Value::Array(list) => Some((train_number.trim().to_string(), list)),
            _ => None,
        })
        .filter(|(train_number, _)| !train_number.is_empty())
        .collect())
}
