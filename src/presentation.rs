// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! View models for the two display surfaces: the tabular list and the fixed-size
//! signage canvas with its scrolling ticker.

use serde::Serialize;

use crate::board::{Board, BoardRow, BoardType};

pub const CANVAS_WIDTH: f64 = 1920.0;
pub const CANVAS_HEIGHT: f64 = 1080.0;
pub const TICKER_SPEED_PX: f64 = 2.0;
pub const TICKER_CHAR_WIDTH_PX: f64 = 24.0;
pub const EMPTY_BOARD_MESSAGE: &str = "No trips in window.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayRow {
    pub trip_id: String,
    pub time: String,
    pub no: String,
    pub train: String,
    pub to: String,
    pub status: String,
    /// Highlighted status tag.
    pub boarding: bool,
    pub gate: String,
    pub track: String,
}

impl From<&BoardRow> for DisplayRow {
    fn from(row: &BoardRow) -> Self {
        Self {
            trip_id: row.trip_id.clone(),
            time: row.time.clone(),
            no: row.no.clone(),
            train: row.train.clone(),
            to: row.to.clone(),
            status: row.status.clone(),
            boarding: row.status == "Boarding",
            gate: row.gate.clone(),
            track: row.track.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListView {
    pub title: String,
    pub station_name: String,
    pub board_type: BoardType,
    pub clock: String,
    pub realtime_available: bool,
    pub rows: Vec<DisplayRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ListView {
    pub fn from_board(board: &Board) -> Self {
        let rows: Vec<DisplayRow> = board.rows.iter().map(DisplayRow::from).collect();
        let message = rows.is_empty().then(|| EMPTY_BOARD_MESSAGE.to_string());

        Self {
            title: board.board_type.title().to_string(),
            station_name: board.station_name.clone(),
            board_type: board.board_type,
            clock: board.clock.clone(),
            realtime_available: board.realtime_available,
            rows,
            message,
        }
    }

    /// Plain-text table, used by `larch board`.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} - {}    {}\n", self.station_name, self.title, self.clock);
        out.push_str(&format!(
            "{:<8} {:<6} {:<22} {:<24} {:<16} {:<5} {:<5}\n",
            "Time", "No.", "Train", if self.board_type.is_departures() { "To" } else { "From" },
            "Status", "Gate", "Track"
        ));

        match &self.message {
            Some(message) => {
                out.push_str(message);
                out.push('\n');
            }
            None => {
                for row in &self.rows {
                    out.push_str(&format!(
                        "{:<8} {:<6} {:<22} {:<24} {:<16} {:<5} {:<5}\n",
                        row.time, row.no, row.train, row.to, row.status, row.gate, row.track
                    ));
                }
            }
        }

        if !self.realtime_available {
            out.push_str("(scheduled times only)\n");
        }

        out
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignageFrame {
    pub width: u32,
    pub height: u32,
    /// Uniform scale that fits the canvas in the viewport it is shown in.
    pub scale: f64,
    pub title: String,
    pub clock: String,
    pub rows: Vec<DisplayRow>,
    pub ticker: String,
    /// Left edge of the ticker text, in canvas pixels.
    pub ticker_x: f64,
    pub ticker_speed_px: f64,
}

impl SignageFrame {
    pub fn from_board(board: &Board, ticker: &str) -> Self {
        Self {
            width: CANVAS_WIDTH as u32,
            height: CANVAS_HEIGHT as u32,
            scale: 1.0,
            title: board.board_type.title().to_string(),
            clock: board.clock.clone(),
            rows: board.rows.iter().map(DisplayRow::from).collect(),
            ticker: ticker.to_string(),
            ticker_x: TickerState::default().position,
            ticker_speed_px: TICKER_SPEED_PX,
        }
    }

    pub fn fit_to(mut self, viewport_width: f64, viewport_height: f64) -> Self {
        self.scale = canvas_scale(viewport_width, viewport_height);
        self
    }

    /// Runs the ticker forward `frames` animation frames for text `text_width` wide.
    pub fn advance_ticker(&mut self, frames: u32, text_width: f64) {
        let mut state = TickerState {
            position: self.ticker_x,
        };
        for _ in 0..frames {
            state.step(text_width);
        }
        self.ticker_x = state.position;
    }
}

/// Rough rendered width of ticker text on the canvas.
pub fn ticker_text_width(text: &str) -> f64 {
    text.chars().count() as f64 * TICKER_CHAR_WIDTH_PX
}

/// Scale that fits the fixed canvas inside a viewport without distortion. Non-positive
/// viewports keep the canvas at 1.
pub fn canvas_scale(viewport_width: f64, viewport_height: f64) -> f64 {
    if !(viewport_width > 0.0 && viewport_height > 0.0) {
        return 1.0;
    }
    (viewport_width / CANVAS_WIDTH).min(viewport_height / CANVAS_HEIGHT)
}

/// Horizontal position of the ticker text, advanced once per animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickerState {
    pub position: f64,
}

impl Default for TickerState {
    fn default() -> Self {
        Self {
            position: CANVAS_WIDTH,
        }
    }
}

impl TickerState {
    /// Moves left by one frame; once the text of `text_width` has fully left the
    /// canvas it starts again from the right edge.
    pub fn step(&mut self, text_width: f64) -> f64 {
        self.position -= TICKER_SPEED_PX;
        if self.position < -text_width {
            self.position = CANVAS_WIDTH;
        }
        self.position
    }
}
