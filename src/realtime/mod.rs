// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Live train positions and their effect on board rows.

pub mod feed;
pub mod fetcher;
pub mod normalise;
pub mod overlay;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Realtime request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Realtime payload is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Realtime upstream answered with status {0}")]
    UpstreamStatus(u16),
    #[error("Realtime payload has an unexpected shape: {0}")]
    UnexpectedShape(&'static str),
}
