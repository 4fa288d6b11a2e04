//! Saved accounts.
//!
//! Accounts live in a single `redb` table keyed by username. Each value is
//! the JSON form of [`Account`].

use crate::config::AppConfig;
use crate::error::{Error, Result};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 255;

/// Longest accepted token, in characters.
pub const MAX_TOKEN_LEN: usize = 2000;

/// A saved account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Login name, unique.
    pub username: String,
    /// Subject id decoded from the token.
    pub steam_id: String,
    /// Bearer token.
    pub token: String,
    /// Whether the account owns the premium tier.
    #[serde(default)]
    pub is_prime: bool,
    /// Avatar URL, empty when unknown.
    #[serde(default)]
    pub profile_picture_url: String,
}

/// Embedded account database.
pub struct AccountStore {
    db: Database,
}

impl AccountStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(Error::database)?;
        tracing::debug!(path = %path.display(), "account database opened");
        Ok(Self { db })
    }

    /// Open the database in the configured data directory.
    pub fn open_default(config: &AppConfig) -> Result<Self> {
        Self::open(&config.database_path()?)
    }

    /// All accounts, sorted by username.
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let txn = self.db.begin_read().map_err(Error::database)?;
        let table = match txn.open_table(ACCOUNTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(Error::database(e)),
        };

        let mut accounts = Vec::new();
        for entry in table.iter().map_err(Error::database)? {
            let (_, value) = entry.map_err(Error::database)?;
            let account: Account = serde_json::from_slice(value.value()).map_err(Error::database)?;
            accounts.push(account);
        }
        Ok(accounts)
    }

    /// Look up one account.
    pub fn get(&self, username: &str) -> Result<Option<Account>> {
        let txn = self.db.begin_read().map_err(Error::database)?;
        let table = match txn.open_table(ACCOUNTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(Error::database(e)),
        };

        let Some(value) = table.get(username).map_err(Error::database)? else {
            return Ok(None);
        };
        let account = serde_json::from_slice(value.value()).map_err(Error::database)?;
        Ok(Some(account))
    }

    /// Token saved for `username`.
    pub fn get_token(&self, username: &str) -> Result<Option<String>> {
        Ok(self.get(username)?.map(|account| account.token))
    }

    /// Save a new account.
    ///
    /// Returns `false` without changing anything when the username is
    /// already saved.
    pub fn add_account(&self, username: &str, token: &str, steam_id: &str) -> Result<bool> {
        let username = username.trim();
        let token = token.trim();
        if username.is_empty() || token.is_empty() {
            return Err(Error::invalid_input("username and token must not be empty"));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(Error::invalid_input(format!(
                "username longer than {} characters",
                MAX_USERNAME_LEN
            )));
        }
        if token.chars().count() > MAX_TOKEN_LEN {
            return Err(Error::invalid_input(format!(
                "token longer than {} characters",
                MAX_TOKEN_LEN
            )));
        }

        let account = Account {
            username: username.to_string(),
            steam_id: steam_id.to_string(),
            token: token.to_string(),
            is_prime: false,
            profile_picture_url: String::new(),
        };
        let bytes = serde_json::to_vec(&account).map_err(Error::database)?;

        let txn = self.db.begin_write().map_err(Error::database)?;
        {
            let mut table = txn.open_table(ACCOUNTS).map_err(Error::database)?;
            if table.get(username).map_err(Error::database)?.is_some() {
                return Ok(false);
            }
            table.insert(username, bytes.as_slice()).map_err(Error::database)?;
        }
        txn.commit().map_err(Error::database)?;

        tracing::info!(username = %username, "account added");
        Ok(true)
    }

    /// Record profile details looked up for `username`.
    ///
    /// Returns `false` when no such account is saved. An empty URL clears the
    /// stored avatar.
    pub fn set_profile(&self, username: &str, is_prime: bool, profile_picture_url: &str) -> Result<bool> {
        let txn = self.db.begin_write().map_err(Error::database)?;
        let updated = {
            let mut table = txn.open_table(ACCOUNTS).map_err(Error::database)?;
            let current = table
                .get(username)
                .map_err(Error::database)?
                .map(|value| serde_json::from_slice::<Account>(value.value()))
                .transpose()
                .map_err(Error::database)?;

            match current {
                Some(mut account) => {
                    account.is_prime = is_prime;
                    account.profile_picture_url = profile_picture_url.to_string();
                    let bytes = serde_json::to_vec(&account).map_err(Error::database)?;
                    table.insert(username, bytes.as_slice()).map_err(Error::database)?;
                    true
                }
                None => false,
            }
        };
        txn.commit().map_err(Error::database)?;

        if updated {
            tracing::debug!(username = %username, is_prime, "profile updated");
        }
        Ok(updated)
    }

    /// Remove an account. Returns whether it existed.
    pub fn delete_account(&self, username: &str) -> Result<bool> {
        let txn = self.db.begin_write().map_err(Error::database)?;
        let removed = {
            let mut table = txn.open_table(ACCOUNTS).map_err(Error::database)?;
            let previous = table.remove(username).map_err(Error::database)?;
            previous.is_some()
        };
        txn.commit().map_err(Error::database)?;

        if removed {
            tracing::info!(username = %username, "account deleted");
        }
        Ok(removed)
    }

    /// Remove every account. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let txn = self.db.begin_write().map_err(Error::database)?;
        let removed = {
            let mut table = txn.open_table(ACCOUNTS).map_err(Error::database)?;
            let keys = table
                .iter()
                .map_err(Error::database)?
                .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::database)?;
            for key in &keys {
                table.remove(key.as_str()).map_err(Error::database)?;
            }
            keys.len()
        };
        txn.commit().map_err(Error::database)?;

        tracing::info!(count = removed, "accounts cleared");
        Ok(removed)
    }
}
