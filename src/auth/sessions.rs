// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use super::accounts::{Account, AccountFilters};
use super::is_authorized;
use crate::schedule_filtering::Region;
use crate::station_time::Clock;

pub const SESSION_COOKIE: &str = "amtrak_session";
pub const SESSION_TTL_SECS: i64 = 8 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub username: String,
    pub routes: Vec<String>,
    pub filters: AccountFilters,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_authorized(&self, path: &str) -> bool {
        is_authorized(&self.routes, path)
    }

    pub fn region(&self) -> Option<Region> {
        self.filters.region()
    }
}

/// In-memory sessions keyed by an opaque token. Nothing is persisted.
pub struct SessionStore {
    sessions: RwLock<AHashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(AHashMap::new()),
            clock,
            ttl: chrono::Duration::seconds(SESSION_TTL_SECS),
        }
    }

    /// Starts a session and drops every session that has already expired.
    pub fn create(&self, username: &str, account: &Account) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = self.clock.now();
        let session = Session {
            username: username.to_string(),
            routes: account.routes.clone(),
            filters: account.filters.clone(),
            expires_at: now + self.ttl,
        };

        if let Ok(mut sessions) = self.sessions.write() {
            sessions.retain(|_, existing| existing.expires_at >= now);
            sessions.insert(token.clone(), session);
        }

        token
    }

    /// The live session for `token`; expired sessions are dropped on lookup.
    pub fn get(&self, token: &str) -> Option<Session> {
        if token.is_empty() {
            return None;
        }

        let now = self.clock.now();
        let mut sessions = self.sessions.write().ok()?;

        match sessions.get(token) {
            Some(session) if session.expires_at >= now => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn destroy(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(token);
        }
    }
}
