// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Accounts, sessions and per-route permissions for the board server.

pub mod accounts;
pub mod sessions;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("I/O error on accounts file '{path}': {source}")]
    AccountsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Accounts file '{path}' is not valid JSON: {source}")]
    AccountsJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("Accounts lock poisoned")]
    Poisoned,
}

/// `*` and `/*` allow everything, a trailing `*` allows a prefix, anything else must
/// match exactly.
pub fn match_route(allowed: &str, path: &str) -> bool {
    if allowed == "*" || allowed == "/*" {
        return true;
    }

    match allowed.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => path == allowed,
    }
}

pub fn is_authorized(routes: &[String], path: &str) -> bool {
    let path = if path == "/" { "/index.html" } else { path };
    routes.iter().any(|allowed| match_route(allowed, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_patterns() {
        assert!(match_route("*", "/data/stops.json"));
        assert!(match_route("/*", "/anything"));
        assert!(match_route("/rt/*", "/rt/trains"));
        assert!(!match_route("/rt/*", "/data/stops.json"));
        assert!(match_route("/board", "/board"));
        assert!(!match_route("/board", "/board/extra"));
    }

    #[test]
    fn root_is_index() {
        let routes = vec!["/index.html".to_string()];
        assert!(is_authorized(&routes, "/"));
        assert!(!is_authorized(&routes, "/data/stops.json"));
        assert!(!is_authorized(&[], "/"));
    }
}
