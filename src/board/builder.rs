// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use super::overrides::{OverrideMap, override_key};
use super::{BoardRequest, BoardRow, BoardType, WINDOW_AHEAD_SECS};
use crate::schedule::{ScheduleStore, day_offset};
use crate::station_time::board_time_label;
use crate::trip_origins::resolve_trip_origins;

/// Status from schedule timing alone.
pub fn infer_status(board_type: BoardType, t: u32, now_sec: u32) -> &'static str {
    let diff = i64::from(t) - i64::from(now_sec);

    match board_type {
        BoardType::Departures => {
            // [-5, 15] minutes, compared in seconds so partial minutes count
            if (-5 * 60..=15 * 60).contains(&diff) {
                "Boarding"
            } else {
                "On Time"
            }
        }
        BoardType::Arrivals => {
            if diff <= 0 {
                "Arrived"
            } else {
                "On Time"
            }
        }
    }
}

/// Scheduled rows for one station and date, windowed around `now_sec` and sorted.
/// Not capped: hidden realtime rows must be removed before the cap applies.
pub fn build_board_rows(
    store: &ScheduleStore,
    request: &BoardRequest,
    overrides: &OverrideMap,
    now_sec: u32,
) -> Vec<BoardRow> {
    let board_type = request.board_type;
    let date_key = request.date_key();
    let active = store.calendar.active_services(&date_key);

    let window_start = now_sec.saturating_sub(board_type.past_grace_secs());
    let window_end = now_sec.saturating_add(WINDOW_AHEAD_SECS);

    let origins = match board_type {
        BoardType::Arrivals => Some(resolve_trip_origins(&store.stop_events)),
        BoardType::Departures => None,
    };

    let mut rows = Vec::new();

    for event in store.events_at(&request.station) {
        let Some(meta) = store.trip(&event.trip_id) else {
            continue;
        };

        if !meta.service_id().is_some_and(|svc| active.contains(svc)) {
            continue;
        }

        let t = match board_type {
            BoardType::Departures => event.departure,
            BoardType::Arrivals => event.arrival,
        };

        let Some(t) = t else {
            continue;
        };

        if day_offset(t) != 0 {
            continue;
        }

        if t < window_start || t > window_end {
            continue;
        }

        let to = match &origins {
            None => meta.headsign().unwrap_or("--").to_string(),
            Some(origins) => match origins.get(&event.trip_id) {
                Some(code) => store
                    .stop(code)
                    .map(|stop| stop.display_name().to_string())
                    .unwrap_or_else(|| code.to_string()),
                None => "--".to_string(),
            },
        };

        let manual = overrides.get(&override_key(&date_key, &request.station, &event.trip_id));

        let status = manual
            .and_then(|o| o.status())
            .unwrap_or_else(|| infer_status(board_type, t, now_sec));

        rows.push(BoardRow {
            trip_id: event.trip_id.clone(),
            sort: t,
            time: board_time_label(Some(t)),
            no: meta.display_train_number().to_string(),
            train: meta.route_label().to_string(),
            to,
            status: status.to_string(),
            gate: manual.and_then(|o| o.gate()).unwrap_or("--").to_string(),
            track: manual.and_then(|o| o.track()).unwrap_or("--").to_string(),
            hidden: false,
        });
    }

    // stable, so same-second rows keep table order
    rows.sort_by_key(|row| row.sort);

    rows
}
