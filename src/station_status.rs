// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::{ScheduleStore, StopEvent, day_offset};
use crate::station_time::{board_time_label, resolve_station_time_zone, second_of_day};

pub const NO_NEXT_EVENT: &str = "—";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StationListView {
    #[default]
    All,
    HasTrains,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StationStatus {
    pub code: String,
    pub name: String,
    pub departures: usize,
    pub arrivals: usize,
    pub next_event: String,
}

fn same_day(t: Option<u32>) -> bool {
    t.is_some_and(|t| day_offset(t) == 0)
}

/// Earliest same-day event at or after `now_sec`, as `"{time}  Train {no}"`.
fn next_event<'a>(
    store: &'a ScheduleStore,
    events: &'a [StopEvent],
    active: &ahash::AHashSet<&str>,
    now_sec: u32,
) -> String {
    events
        .iter()
        .filter_map(|event| {
            let meta = store.trip(&event.trip_id)?;
            if !meta.service_id().is_some_and(|svc| active.contains(svc)) {
                return None;
            }
            let t = event.departure.or(event.arrival)?;
            (day_offset(t) == 0 && t >= now_sec).then_some((t, meta))
        })
        // first wins on equal times
        .fold(None, |best: Option<(u32, _)>, candidate| match best {
            Some(current) if current.0 <= candidate.0 => Some(current),
            _ => Some(candidate),
        })
        .map(|(t, meta)| format!("{}  Train {}", board_time_label(Some(t)), meta.display_train_number()))
        .unwrap_or_else(|| NO_NEXT_EVENT.to_string())
}

/// One entry per station for `date`, sorted by name.
pub fn list_station_status(
    store: &ScheduleStore,
    date: NaiveDate,
    search: Option<&str>,
    view: StationListView,
    now: DateTime<Utc>,
) -> Vec<StationStatus> {
    let date_key = date.format("%Y%m%d").to_string();
    let active = store.calendar.active_services(&date_key);
    let search = search
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    store
        .stations_by_name()
        .into_iter()
        .filter(|stop| match &search {
            Some(q) => {
                stop.id.to_lowercase().contains(q.as_str())
                    || stop.display_name().to_lowercase().contains(q.as_str())
            }
            None => true,
        })
        .filter_map(|stop| {
            let events = store.events_at(&stop.id);

            let running = events.iter().filter(|event| {
                store
                    .trip(&event.trip_id)
                    .and_then(|meta| meta.service_id())
                    .is_some_and(|svc| active.contains(svc))
            });

            let (departures, arrivals) = running.fold((0, 0), |(dep, arr), event| {
                (
                    dep + usize::from(same_day(event.departure)),
                    arr + usize::from(same_day(event.arrival)),
                )
            });

            if view == StationListView::HasTrains && departures + arrivals == 0 {
                return None;
            }

            let now_sec = second_of_day(now, resolve_station_time_zone(Some(stop)));

            Some(StationStatus {
                code: stop.id.to_string(),
                name: stop.display_name().to_string(),
                departures,
                arrivals,
                next_event: next_event(store, events, &active, now_sec),
            })
        })
        .collect()
}
