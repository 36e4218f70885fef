// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Views over the live feed alone: running trains grouped by service, and one train's
//! stops split into past and planned.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::realtime::feed::RawTrainFeed;
use crate::realtime::normalise::{StationSighting, TrainSighting, choose_sighting, normalise_sighting};
use crate::realtime::overlay::RELABEL_TOLERANCE_SECS;
use crate::schedule::ScheduleStore;
use crate::station_time::{DEFAULT_STATION_TZ, ServiceDay, resolve_station_time_zone, short_time_label};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunningTrain {
    pub num: String,
    pub service: String,
    pub next_stop: String,
    /// `Depart` or `Arrive`, empty when the train has no stops left.
    pub next_event: String,
    pub eta: String,
    pub status: String,
}

impl RunningTrain {
    fn matches(&self, query: &str) -> bool {
        format!("{} {} {} {}", self.num, self.service, self.next_stop, self.status)
            .to_lowercase()
            .contains(query)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceGroup {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub trains: Vec<RunningTrain>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineItem {
    pub code: String,
    pub name: String,
    pub event: String,
    /// `MM/DD/YYYY HH:MM` in the stop's zone, `--` when the feed has no time.
    pub time: String,
    pub status: String,
    #[serde(skip)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrainTimeline {
    pub num: String,
    pub service: String,
    pub status: Option<String>,
    pub past: Vec<TimelineItem>,
    pub planned: Vec<TimelineItem>,
}

fn sighting_for(feed: &RawTrainFeed, num: &str, now: DateTime<Utc>) -> Option<TrainSighting> {
    let raw = choose_sighting(feed.get(num.trim())?)?;
    normalise_sighting(raw, ServiceDay::containing(now, DEFAULT_STATION_TZ))
}

fn stop_zone(store: &ScheduleStore, station: &StationSighting) -> Tz {
    resolve_station_time_zone(store.stop(&station.code))
}

/// Feed name, then the schedule's name, then the code.
fn stop_name(store: &ScheduleStore, station: &StationSighting) -> String {
    if let Some(name) = crate::non_blank(station.name.as_deref()) {
        return name.to_string();
    }
    if let Some(stop) = store.stop(&station.code) {
        return stop.display_name().to_string();
    }
    if station.code.is_empty() {
        "--".to_string()
    } else {
        station.code.clone()
    }
}

fn running_train(store: &ScheduleStore, num: &str, train: &TrainSighting) -> RunningTrain {
    let next = train
        .stations
        .iter()
        .find(|station| station.status.as_deref() != Some("Departed"));

    let mut status = crate::non_blank(train.status.as_deref())
        .or_else(|| crate::non_blank(train.current_status.as_deref()))
        .or_else(|| next.and_then(|station| crate::non_blank(station.status.as_deref())))
        .unwrap_or("Running")
        .to_string();

    let Some(next) = next else {
        return RunningTrain {
            num: num.to_string(),
            service: train.service_label().to_string(),
            next_stop: "--".to_string(),
            next_event: String::new(),
            eta: "--".to_string(),
            status,
        };
    };

    let tz = stop_zone(store, next);
    let mut eta = next
        .best_time()
        .map(|t| short_time_label(t, tz))
        .unwrap_or_else(|| "--".to_string());

    let running = next.departure.running.or(next.arrival.running);
    let scheduled = next.departure.scheduled.or(next.arrival.scheduled);

    if let Some(running) = running {
        let differs = match scheduled {
            None => true,
            Some(scheduled) => (running - scheduled).num_seconds().abs() > RELABEL_TOLERANCE_SECS,
        };
        if differs {
            eta = short_time_label(running, tz);
            status = format!("Now {}", eta);
        }
    }

    let departs = next.departure.running.is_some() || next.departure.scheduled.is_some();

    RunningTrain {
        num: num.to_string(),
        service: train.service_label().to_string(),
        next_stop: stop_name(store, next),
        next_event: if departs { "Depart" } else { "Arrive" }.to_string(),
        eta,
        status,
    }
}

/// Trains with at least one stop in their chosen sighting, grouped by service name.
/// Groups sort by label and trains by number; `search` drops non-matching trains and
/// then any group left empty.
pub fn train_details(
    store: &ScheduleStore,
    feed: &RawTrainFeed,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<ServiceGroup> {
    let query = search
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut groups: AHashMap<String, Vec<RunningTrain>> = AHashMap::new();

    for num in feed.keys() {
        let Some(train) = sighting_for(feed, num, now) else {
            continue;
        };
        if train.stations.is_empty() {
            continue;
        }

        let row = running_train(store, num, &train);
        if query.as_deref().is_some_and(|q| !row.matches(q)) {
            continue;
        }

        groups.entry(row.service.clone()).or_default().push(row);
    }

    let mut services: Vec<ServiceGroup> = groups
        .into_iter()
        .map(|(key, mut trains)| {
            trains.sort_by(|a, b| a.num.cmp(&b.num));
            ServiceGroup {
                label: key.clone(),
                key,
                count: trains.len(),
                trains,
            }
        })
        .collect();

    services.sort_by(|a, b| a.label.cmp(&b.label));
    services
}

fn event_label(station: &StationSighting) -> String {
    if let Some(status) = station.status_text() {
        return status.trim().to_string();
    }
    if station.departure.running.is_some() || station.departure.scheduled.is_some() {
        "Depart".to_string()
    } else if station.arrival.running.is_some() || station.arrival.scheduled.is_some() {
        "Arrive".to_string()
    } else {
        "Through".to_string()
    }
}

/// One train's stops split into `past` and `planned`, each sorted by time.
///
/// A stop is past when it says `Departed`, or when its time has gone by and it carries
/// any status. Stops without a time sort first. `None` when the train is not in the feed.
pub fn train_timeline(
    store: &ScheduleStore,
    feed: &RawTrainFeed,
    num: &str,
    now: DateTime<Utc>,
) -> Option<TrainTimeline> {
    let train = sighting_for(feed, num, now)?;

    let mut past = Vec::new();
    let mut planned = Vec::new();

    for station in &train.stations {
        let at = station.best_time();
        let tz = stop_zone(store, station);
        let status = station.status_trimmed().to_string();

        let item = TimelineItem {
            code: station.code.clone(),
            name: stop_name(store, station),
            event: event_label(station),
            time: at
                .map(|t| t.with_timezone(&tz).format("%m/%d/%Y %H:%M").to_string())
                .unwrap_or_else(|| "--".to_string()),
            status,
            at,
        };

        let gone_by = item.at.is_some_and(|t| t < now) && !item.status.is_empty();

        if item.status == "Departed" || gone_by {
            past.push(item);
        } else {
            planned.push(item);
        }
    }

    let sort_key = |item: &TimelineItem| item.at.map(|t| t.timestamp_millis()).unwrap_or(0);
    past.sort_by_key(sort_key);
    planned.sort_by_key(sort_key);

    Some(TrainTimeline {
        num: num.trim().to_string(),
        service: train.service_label().to_string(),
        status: crate::non_blank(train.status.as_deref()).map(str::to_string),
        past,
        planned,
    })
}
