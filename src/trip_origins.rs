// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use ahash::AHashMap;

use crate::schedule::{StationCode, StationEvents};

/// Trip id -> the station where that trip's earliest event happens.
///
/// A missing time counts as +infinity, so a trip whose events carry no times still
/// gets the first station it appears at. Ties keep the first station in table order.
pub fn resolve_trip_origins(stop_events: &StationEvents) -> AHashMap<String, StationCode> {
    let mut best: AHashMap<&str, (u64, &StationCode)> = AHashMap::new();

    for (code, events) in stop_events.iter() {
        for event in events {
            let t = event.earliest_time().map(u64::from).unwrap_or(u64::MAX);

            match best.get_mut(event.trip_id.as_str()) {
                Some(current) => {
                    if t < current.0 {
                        *current = (t, code);
                    }
                }
                None => {
                    best.insert(event.trip_id.as_str(), (t, code));
                }
            }
        }
    }

    best.into_iter()
        .map(|(trip_id, (_, code))| (trip_id.to_string(), code.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::StopEvent;

    #[test]
    fn earliest_station_wins() {
        let mut events = StationEvents::new();
        events.insert(
            StationCode::from("A"),
            vec![StopEvent::new(Some(500), Some(520), "T")],
        );
        events.insert(
            StationCode::from("B"),
            vec![StopEvent::new(Some(10), Some(30), "T")],
        );

        let origins = resolve_trip_origins(&events);
        assert_eq!(origins["T"], "B");
    }

    #[test]
    fn ties_keep_first_station_in_table_order() {
        let mut events = StationEvents::new();
        events.insert(
            StationCode::from("WAS"),
            vec![StopEvent::new(None, Some(100), "T")],
        );
        events.insert(
            StationCode::from("BAL"),
            vec![StopEvent::new(Some(100), None, "T")],
        );

        assert_eq!(resolve_trip_origins(&events)["T"], "WAS");
    }

    #[test]
    fn ties_follow_file_order_after_loading() {
        let store = crate::schedule::ScheduleStore::from_json_tables(
            &serde_json::Value::Null,
            &serde_json::Value::Null,
            &serde_json::Value::Null,
            &serde_json::from_str(r#"{"WAS":[[null,100,"T"]],"BAL":[[100,null,"T"]]}"#).unwrap(),
        );

        assert_eq!(resolve_trip_origins(&store.stop_events)["T"], "WAS");
    }

    #[test]
    fn timeless_trip_still_gets_an_origin() {
        let mut events = StationEvents::new();
        events.insert(
            StationCode::from("NYP"),
            vec![StopEvent::new(None, None, "GHOST")],
        );
        events.insert(
            StationCode::from("PHL"),
            vec![StopEvent::new(None, None, "GHOST")],
        );

        assert_eq!(resolve_trip_origins(&events)["GHOST"], "NYP");
    }

    #[test]
    fn fixture_origins() {
        let store = crate::schedule::test_fixtures::small_store();
        let origins = resolve_trip_origins(&store.stop_events);
        assert_eq!(origins["T1"], "NYP");
        assert_eq!(origins["T2"], "BOS");
        assert_eq!(origins["T3"], "NYP");
    }
}
