// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Per-station departure and arrival boards.
//!
//! A render runs the builder, then the realtime overlay, then drops hidden rows and
//! caps the result. Row order is fixed by the builder.

pub mod builder;
pub mod overrides;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::realtime::fetcher::RealtimeCache;
use crate::realtime::overlay::apply_overlay;
use crate::schedule::{ScheduleStore, StationCode};
use crate::station_time::{Clock, clock_label, resolve_station_time_zone, second_of_day};
use overrides::OverrideStore;

pub const MAX_BOARD_ROWS: usize = 20;
pub const WINDOW_AHEAD_SECS: u32 = 8 * 3600;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    #[default]
    Departures,
    Arrivals,
}

impl BoardType {
    pub fn is_departures(&self) -> bool {
        matches!(self, BoardType::Departures)
    }

    /// How far back the window reaches. Arrivals show everything since midnight.
    pub fn past_grace_secs(&self) -> u32 {
        match self {
            BoardType::Departures => 120,
            BoardType::Arrivals => 86_400,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            BoardType::Departures => "Departures",
            BoardType::Arrivals => "Arrivals",
        }
    }
}

impl FromStr for BoardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "departures" | "dep" => Ok(BoardType::Departures),
            "arrivals" | "arr" => Ok(BoardType::Arrivals),
            other => Err(format!("unknown board type '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    pub trip_id: String,
    /// Second-of-day the row was built from.
    pub sort: u32,
    pub time: String,
    pub no: String,
    pub train: String,
    pub to: String,
    pub status: String,
    pub gate: String,
    pub track: String,
    #[serde(skip)]
    pub hidden: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardRequest {
    pub station: StationCode,
    pub board_type: BoardType,
    pub service_date: NaiveDate,
}

impl BoardRequest {
    /// `YYYYMMDD`, the calendar and override key for the service date.
    pub fn date_key(&self) -> String {
        self.service_date.format("%Y%m%d").to_string()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Board {
    pub station: StationCode,
    pub station_name: String,
    pub board_type: BoardType,
    pub service_date: NaiveDate,
    pub time_zone: String,
    pub clock: String,
    pub realtime_available: bool,
    pub rows: Vec<BoardRow>,
}

/// Owns the pieces a render needs besides the schedule itself.
pub struct BoardService {
    overrides: OverrideStore,
    realtime: Option<Arc<RealtimeCache>>,
    clock: Arc<dyn Clock>,
}

impl BoardService {
    pub fn new(
        overrides: OverrideStore,
        realtime: Option<Arc<RealtimeCache>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            overrides,
            realtime,
            clock,
        }
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn render(&self, schedule: &ScheduleStore, request: &BoardRequest) -> Board {
        let stop = schedule.stop(&request.station);
        let tz = resolve_station_time_zone(stop);
        let now = self.clock.now();
        let now_sec = second_of_day(now, tz);

        let overrides = self.overrides.all();
        let mut rows = builder::build_board_rows(schedule, request, &overrides, now_sec);

        let mut realtime_available = false;

        if let Some(cache) = &self.realtime {
            match cache.get().await {
                Some(feed) => {
                    apply_overlay(
                        &mut rows,
                        &feed,
                        &request.station,
                        request.board_type,
                        now,
                        tz,
                    );
                    realtime_available = true;
                }
                None => {
                    debug!(
                        "No realtime feed for {} board at {}, showing schedule only",
                        request.board_type.title(),
                        request.station
                    );
                }
            }
        }

        rows.retain(|row| !row.hidden);
        rows.truncate(MAX_BOARD_ROWS);

        Board {
            station: request.station.clone(),
            station_name: stop
                .map(|s| s.display_name().to_string())
                .unwrap_or_else(|| request.station.to_string()),
            board_type: request.board_type,
            service_date: request.service_date,
            time_zone: tz.name().to_string(),
            clock: clock_label(now, tz),
            realtime_available,
            rows,
        }
    }
}
