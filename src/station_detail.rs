// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Every same-day event at one station, unwindowed and uncapped.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::board::BoardType;
use crate::schedule::{ScheduleStore, StationCode, day_offset};
use crate::station_time::{board_time_label, resolve_station_time_zone, second_of_day};
use crate::trip_origins::resolve_trip_origins;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailTab {
    All,
    #[default]
    Departures,
    Arrivals,
}

impl DetailTab {
    fn shows(&self, kind: BoardType) -> bool {
        match self {
            DetailTab::All => true,
            DetailTab::Departures => kind == BoardType::Departures,
            DetailTab::Arrivals => kind == BoardType::Arrivals,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StationEventRow {
    pub kind: BoardType,
    pub sort: u32,
    pub time: String,
    pub no: String,
    pub route: String,
    /// Headsign for departures, origin station name for arrivals.
    pub dir: String,
    pub status: String,
    pub trip_id: String,
}

impl StationEventRow {
    fn matches(&self, query: &str) -> bool {
        format!("{} {} {} {}", self.no, self.route, self.dir, self.status)
            .to_lowercase()
            .contains(query)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StationDetail {
    pub station: StationCode,
    pub station_name: String,
    pub service_date: NaiveDate,
    pub time_zone: String,
    pub tab: DetailTab,
    pub count: usize,
    pub rows: Vec<StationEventRow>,
}

fn timed_status(kind: BoardType, t: u32, now_sec: u32) -> &'static str {
    match (t < now_sec, kind) {
        (true, BoardType::Departures) => "Departed",
        (true, BoardType::Arrivals) => "Arrived",
        (false, _) => "Scheduled",
    }
}

/// Rows for `tab`, sorted by time, narrowed by a case-insensitive `search` over
/// number, route, direction and status.
pub fn station_detail(
    store: &ScheduleStore,
    code: &str,
    date: NaiveDate,
    tab: DetailTab,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> StationDetail {
    let code = code.trim().to_ascii_uppercase();
    let stop = store.stop(&code);
    let tz = resolve_station_time_zone(stop);
    let now_sec = second_of_day(now, tz);

    let date_key = date.format("%Y%m%d").to_string();
    let active = store.calendar.active_services(&date_key);
    let origins = resolve_trip_origins(&store.stop_events);

    let mut rows = Vec::new();

    for event in store.events_at(&code) {
        let Some(meta) = store.trip(&event.trip_id) else {
            continue;
        };
        if !meta.service_id().is_some_and(|svc| active.contains(svc)) {
            continue;
        }

        let mut push = |kind: BoardType, t: u32, dir: String| {
            rows.push(StationEventRow {
                kind,
                sort: t,
                time: board_time_label(Some(t)),
                no: meta.display_train_number().to_string(),
                route: meta.route_label().to_string(),
                dir,
                status: timed_status(kind, t, now_sec).to_string(),
                trip_id: event.trip_id.clone(),
            });
        };

        if let Some(t) = event.departure.filter(|t| day_offset(*t) == 0) {
            push(
                BoardType::Departures,
                t,
                meta.headsign().unwrap_or("--").to_string(),
            );
        }

        if let Some(t) = event.arrival.filter(|t| day_offset(*t) == 0) {
            let origin = origins
                .get(&event.trip_id)
                .map(|origin| {
                    store
                        .stop(origin)
                        .map(|s| s.display_name().to_string())
                        .unwrap_or_else(|| origin.to_string())
                })
                .unwrap_or_else(|| "--".to_string());
            push(BoardType::Arrivals, t, origin);
        }
    }

    rows.sort_by_key(|row| row.sort);

    let query = search
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    rows.retain(|row| {
        tab.shows(row.kind) && query.as_deref().is_none_or(|q| row.matches(q))
    });

    StationDetail {
        station: code.as_str().into(),
        station_name: stop
            .map(|s| s.display_name().to_string())
            .unwrap_or_else(|| code.clone()),
        service_date: date,
        time_zone: tz.name().to_string(),
        tab,
        count: rows.len(),
        rows,
    }
}
