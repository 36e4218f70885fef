// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_unit_value,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::deprecated_clippy_cfg_attr,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod auth;
pub mod board;
pub mod kv_store;
pub mod live_trains;
pub mod preferences;
pub mod presentation;
pub mod realtime;
pub mod schedule;
pub mod schedule_filtering;
pub mod station_detail;
pub mod station_status;
pub mod station_time;
pub mod trip_detail;
pub mod trip_origins;

/// Carrier whose sightings are preferred when a train number has several providers.
pub const HOME_CARRIER: &str = "Amtrak";

/// `2024-06-01` -> `20240601`
pub fn iso_date_to_key(iso: &str) -> String {
    iso.replace('-', "")
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
