// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::RealtimeError;
use super::feed::{RawTrainFeed, parse_train_feed};
use crate::station_time::Clock;

pub const DEFAULT_REALTIME_UPSTREAM: &str = "https://api-v3.amtraker.com/v3";
pub const REALTIME_CACHE_TTL: Duration = Duration::from_secs(30);

pub trait RealtimeFetcher: Send + Sync {
    fn fetch_trains(&self) -> BoxFuture<'_, Result<RawTrainFeed, RealtimeError>>;
    fn fetch_stations(&self) -> BoxFuture<'_, Result<Value, RealtimeError>>;
}

pub struct HttpRealtimeFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRealtimeFetcher {
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, RealtimeError> {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true).deflate(true);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, RealtimeError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RealtimeError::UpstreamStatus(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl RealtimeFetcher for HttpRealtimeFetcher {
    fn fetch_trains(&self) -> BoxFuture<'_, Result<RawTrainFeed, RealtimeError>> {
        Box::pin(async move { parse_train_feed(self.get_json("trains").await?) })
    }

    fn fetch_stations(&self) -> BoxFuture<'_, Result<Value, RealtimeError>> {
        Box::pin(async move { self.get_json("stations").await })
    }
}

#[derive(Clone)]
struct CachedFeed {
    /// When the fetch that produced this entry started.
    fetch_started: DateTime<Utc>,
    feed: Arc<RawTrainFeed>,
}

/// Process-wide holder of the last good train feed.
///
/// Failures are never cached. A fetch that finishes after a newer one has already
/// landed is discarded.
pub struct RealtimeCache {
    fetcher: Arc<dyn RealtimeFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: RwLock<Option<CachedFeed>>,
}

impl RealtimeCache {
    pub fn new(fetcher: Arc<dyn RealtimeFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(fetcher, clock, REALTIME_CACHE_TTL)
    }

    pub fn with_ttl(fetcher: Arc<dyn RealtimeFetcher>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            fetcher,
            clock,
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn RealtimeFetcher> {
        &self.fetcher
    }

    fn is_fresh(&self, entry: &CachedFeed, now: DateTime<Utc>) -> bool {
        (now - entry.fetch_started)
            .to_std()
            .map(|age| age < self.ttl)
            // a start time ahead of the clock counts as fresh
            .unwrap_or(true)
    }

    /// The cached feed when fresh, else a new fetch. `None` when the upstream fails.
    pub async fn get(&self) -> Option<Arc<RawTrainFeed>> {
        let now = self.clock.now();

        if let Some(entry) = self.entry.read().await.as_ref() {
            if self.is_fresh(entry, now) {
                return Some(entry.feed.clone());
            }
        }

        let fetch_started = self.clock.now();

        let feed = match self.fetcher.fetch_trains().await {
            Ok(feed) => Arc::new(feed),
            Err(err) => {
                warn!("Realtime fetch failed: {}", err);
                return None;
            }
        };

        let mut entry = self.entry.write().await;

        if let Some(existing) = entry.as_ref() {
            if existing.fetch_started > fetch_started {
                debug!("Discarding realtime fetch superseded by a newer one");
                return Some(existing.feed.clone());
            }
        }

        *entry = Some(CachedFeed {
            fetch_started,
            feed: feed.clone(),
        });

        Some(feed)
    }
}
