// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::realtime::feed::RawTrainFeed;
use crate::realtime::normalise::{TrainSighting, choose_sighting, normalise_sighting};
use crate::schedule::{ScheduleStore, StationCode};
use crate::station_time::{
    ServiceDay, instant_from_service_seconds, resolve_station_time_zone, short_time_label,
};

const NO_TIME: &str = "--";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStopRow {
    pub code: String,
    pub name: String,
    pub sch_arr: String,
    pub arr: String,
    pub sch_dep: String,
    pub dep: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TripDetail {
    pub station: StationCode,
    pub station_name: String,
    pub trip_id: String,
    pub service_date: NaiveDate,
    pub train_number: Option<String>,
    pub route: Option<String>,
    pub headsign: Option<String>,
    /// Whether `rows` came from the live feed or from the schedule at `station`.
    pub realtime: bool,
    pub rows: Vec<TripStopRow>,
}

fn label(instant: Option<DateTime<Utc>>, tz: Tz) -> String {
    instant
        .map(|t| short_time_label(t, tz))
        .unwrap_or_else(|| NO_TIME.to_string())
}

fn realtime_rows(store: &ScheduleStore, train: &TrainSighting) -> Vec<TripStopRow> {
    train
        .stations
        .iter()
        .map(|st| {
            let stop = store.stop(&st.code);
            let tz = resolve_station_time_zone(stop);

            TripStopRow {
                code: st.code.clone(),
                name: stop
                    .map(|s| s.display_name().to_string())
                    .unwrap_or_else(|| st.code.clone()),
                sch_arr: label(st.arrival.scheduled, tz),
                arr: label(st.arrival.running, tz),
                sch_dep: label(st.departure.scheduled, tz),
                dep: label(st.departure.running, tz),
                status: st.status_trimmed().to_string(),
            }
        })
        .collect()
}

/// Stop-by-stop times for one trip, seen from `station`.
///
/// Uses the live stop list when the feed has the trip's train with at least one stop.
/// Otherwise falls back to one scheduled row for `station`. `None` when the trip is not
/// in the schedule.
pub fn trip_detail(
    store: &ScheduleStore,
    station: &str,
    trip_id: &str,
    date: NaiveDate,
    feed: Option<&RawTrainFeed>,
    now: DateTime<Utc>,
) -> Option<TripDetail> {
    let meta = store.trip(trip_id)?;
    let station = station.trim().to_ascii_uppercase();
    let stop = store.stop(&station);
    let tz = resolve_station_time_zone(stop);
    let station_name = stop
        .map(|s| s.display_name().to_string())
        .unwrap_or_else(|| station.clone());

    let train_number = crate::non_blank(meta.train_number.as_deref()).map(str::to_string);

    let live = train_number
        .as_deref()
        .and_then(|number| feed?.get(number))
        .and_then(|sightings| choose_sighting(sightings))
        .and_then(|raw| normalise_sighting(raw, ServiceDay::containing(now, tz)))
        .filter(|train| !train.stations.is_empty());

    let (realtime, rows) = match live {
        Some(train) => (true, realtime_rows(store, &train)),
        None => {
            let scheduled = store
                .events_at(&station)
                .iter()
                .find(|event| event.trip_id == trip_id);
            let at = |seconds: Option<u32>| match seconds {
                Some(seconds) => short_time_label(instant_from_service_seconds(date, seconds, tz), tz),
                None => NO_TIME.to_string(),
            };

            let row = TripStopRow {
                code: station.clone(),
                name: station_name.clone(),
                sch_arr: at(scheduled.and_then(|e| e.arrival)),
                arr: NO_TIME.to_string(),
                sch_dep: at(scheduled.and_then(|e| e.departure)),
                dep: NO_TIME.to_string(),
                status: "Scheduled".to_string(),
            };
            (false, vec![row])
        }
    };

    Some(TripDetail {
        station: station.as_str().into(),
        station_name,
        trip_id: trip_id.to_string(),
        service_date: date,
        train_number,
        route: crate::non_blank(meta.route_long_name.as_deref()).map(str::to_string),
        headsign: meta.headsign().map(str::to_string),
        realtime,
        rows,
    })
}
