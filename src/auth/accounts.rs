// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::info;

use super::AuthError;
use crate::schedule_filtering::Region;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl AccountFilters {
    pub fn region(&self) -> Option<Region> {
        Region::from_tag(self.region.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Argon2 PHC string.
    pub hash: String,
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub filters: AccountFilters,
}

pub type Accounts = BTreeMap<String, Account>;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(AuthError::Hash)
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn read_accounts(path: &Path) -> Result<Accounts, AuthError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Accounts::new()),
        Err(source) => {
            return Err(AuthError::AccountsIo {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&raw).map_err(|source| AuthError::AccountsJson {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_accounts(path: &Path, accounts: &Accounts) -> Result<(), AuthError> {
    let serialised =
        serde_json::to_vec_pretty(accounts).map_err(|source| AuthError::AccountsJson {
            path: path.to_path_buf(),
            source,
        })?;

    std::fs::write(path, serialised).map_err(|source| AuthError::AccountsIo {
        path: path.to_path_buf(),
        source,
    })
}

struct CachedAccounts {
    modified: Option<SystemTime>,
    accounts: Arc<Accounts>,
}

/// The accounts file, re-read whenever its modification time changes.
pub struct AccountsFile {
    path: PathBuf,
    cache: RwLock<CachedAccounts>,
}

impl AccountsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(CachedAccounts {
                modified: None,
                accounts: Arc::new(Accounts::new()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accounts(&self) -> Result<Arc<Accounts>, AuthError> {
        let modified = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.modified().ok(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Arc::new(Accounts::new()));
            }
            Err(source) => {
                return Err(AuthError::AccountsIo {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        {
            let cache = self.cache.read().map_err(|_| AuthError::Poisoned)?;
            if cache.modified.is_some() && cache.modified == modified {
                return Ok(cache.accounts.clone());
            }
        }

        let accounts = Arc::new(read_accounts(&self.path)?);
        info!(
            "Loaded {} accounts from {}",
            accounts.len(),
            self.path.display()
        );

        let mut cache = self.cache.write().map_err(|_| AuthError::Poisoned)?;
        *cache = CachedAccounts {
            modified,
            accounts: accounts.clone(),
        };

        Ok(accounts)
    }

    /// The account when `username` exists and `password` matches its hash.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, AuthError> {
        let accounts = self.accounts()?;

        Ok(accounts
            .get(username.trim())
            .filter(|account| verify_password(&account.hash, password))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("amtrak-board-accounts-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not a phc string", "hunter2"));
    }

    #[test]
    fn authenticate_against_file() {
        let path = temp_path();
        let mut accounts = Accounts::new();
        accounts.insert(
            "ops".into(),
            Account {
                hash: hash_password("secret").unwrap(),
                routes: vec!["*".into()],
                filters: AccountFilters {
                    region: Some("nec".into()),
                },
            },
        );
        write_accounts(&path, &accounts).unwrap();

        let file = AccountsFile::new(&path);
        let account = file.authenticate(" ops ", "secret").unwrap().unwrap();
        assert_eq!(account.filters.region(), Some(Region::NortheastCorridor));
        assert!(file.authenticate("ops", "wrong").unwrap().is_none());
        assert!(file.authenticate("nobody", "secret").unwrap().is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_has_no_accounts() {
        let file = AccountsFile::new(temp_path());
        assert!(file.accounts().unwrap().is_empty());
    }
}
