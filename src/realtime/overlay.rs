// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::feed::RawTrainFeed;
use super::normalise::{StationSighting, TimePoints, TrainSighting, choose_sighting, normalise_sighting};
use crate::board::{BoardRow, BoardType};
use crate::station_time::{ServiceDay, short_time_label};

/// Estimated-vs-scheduled gap, in seconds, before a row reads as delayed or early.
pub const DELAY_THRESHOLD_SECS: i64 = 300;

/// Running times this close to the schedule do not relabel the row.
pub const RELABEL_TOLERANCE_SECS: i64 = 60;

fn completed_label(board_type: BoardType) -> &'static str {
    match board_type {
        BoardType::Departures => "Departed",
        BoardType::Arrivals => "Arrived",
    }
}

/// Board-relevant side first, the other side as fallback.
fn sides(station: &StationSighting, board_type: BoardType) -> (&TimePoints, &TimePoints) {
    match board_type {
        BoardType::Departures => (&station.departure, &station.arrival),
        BoardType::Arrivals => (&station.arrival, &station.departure),
    }
}

/// Matches `Math.round` on minutes: halves round up.
fn whole_minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0 + 0.5).floor() as i64
}

fn delay_status(points: &TimePoints) -> Option<String> {
    let (estimated, scheduled) = (points.estimated?, points.scheduled?);
    let diff = (estimated - scheduled).num_seconds();

    if diff >= DELAY_THRESHOLD_SECS {
        Some(format!("Delayed {}m", whole_minutes(diff)))
    } else if diff <= -DELAY_THRESHOLD_SECS {
        Some(format!("Early {}m", whole_minutes(diff).abs()))
    } else {
        None
    }
}

/// Status from a live sighting, first match wins:
/// provider text, then arrived/departed flags, then an actual time already past,
/// then the estimated-vs-scheduled gap.
pub fn derive_status(
    train: &TrainSighting,
    station: Option<&StationSighting>,
    board_type: BoardType,
    now: DateTime<Utc>,
) -> Option<String> {
    if let Some(text) = train.status.as_deref() {
        return Some(text.to_string());
    }

    let station = station?;

    if let Some(text) = station.status_text() {
        return Some(text.to_string());
    }

    let flagged = match board_type {
        BoardType::Departures => station.departed,
        BoardType::Arrivals => station.arrived,
    };
    if flagged {
        return Some(completed_label(board_type).to_string());
    }

    let (primary, secondary) = sides(station, board_type);

    if primary
        .actual
        .or(secondary.actual)
        .is_some_and(|actual| actual <= now)
    {
        return Some(completed_label(board_type).to_string());
    }

    delay_status(primary).or_else(|| delay_status(secondary))
}

/// The feed says this stop is already done for this board.
pub fn is_completed_at_station(station: &StationSighting, board_type: BoardType) -> bool {
    match station.status.as_deref().map(str::trim) {
        Some("Departed") => true,
        Some("Arrived") => board_type == BoardType::Arrivals,
        _ => false,
    }
}

/// Mutates status and time of rows that have a live sighting and marks completed stops
/// hidden. Never reorders rows. Bare second-of-day feed times are read on the local day
/// `now` falls on.
pub fn apply_overlay(
    rows: &mut [BoardRow],
    feed: &RawTrainFeed,
    station_code: &str,
    board_type: BoardType,
    now: DateTime<Utc>,
    tz: Tz,
) {
    let day = ServiceDay::containing(now, tz);

    for row in rows.iter_mut() {
        let Some(sightings) = feed.get(row.no.trim()) else {
            continue;
        };

        let Some(train) = choose_sighting(sightings).and_then(|raw| normalise_sighting(raw, day))
        else {
            continue;
        };

        let station = train.station(station_code);

        if let Some(status) = derive_status(&train, station, board_type, now) {
            row.status = status;
        }

        let Some(station) = station else {
            continue;
        };

        if is_completed_at_station(station, board_type) {
            row.hidden = true;
            continue;
        }

        let (points, _) = sides(station, board_type);

        if let Some(running) = points.running {
            let differs = match points.scheduled {
                None => true,
                Some(scheduled) => (running - scheduled).num_seconds().abs() > RELABEL_TOLERANCE_SECS,
            };

            if differs {
                let label = short_time_label(running, tz);
                row.status = format!("Now {}", label);
                row.time = label;
            }
        }
    }
}
