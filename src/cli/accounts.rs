//! Saved account commands.

use super::parsers::{read_input, write_output};
use cachelogin::interchange;
use cachelogin::profile::ProfileClient;
use cachelogin::{token, AccountStore, AppConfig, Error, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Account management commands
#[derive(Subcommand, Debug)]
pub enum AccountsCmd {
    /// List saved accounts
    #[command(alias = "ls")]
    List(ListCmd),

    /// Save an account
    Add(AddCmd),

    /// Delete a saved account
    #[command(alias = "rm")]
    Delete(DeleteCmd),

    /// Delete every saved account
    Clear(ClearCmd),

    /// Look up prime status and avatars on the community site
    Refresh(RefreshCmd),
}

impl AccountsCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let store = AccountStore::open_default(config)?;
        match self {
            AccountsCmd::List(cmd) => cmd.run(&store),
            AccountsCmd::Add(cmd) => cmd.run(&store),
            AccountsCmd::Delete(cmd) => cmd.run(&store),
            AccountsCmd::Clear(cmd) => cmd.run(&store),
            AccountsCmd::Refresh(cmd) => cmd.run(&store, config),
        }
    }
}

// ============================================================================
// List Command
// ============================================================================

/// List saved accounts
#[derive(Args, Debug)]
pub struct ListCmd {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListCmd {
    pub fn run(self, store: &AccountStore) -> Result<()> {
        let accounts = store.list_accounts()?;

        if self.json {
            // Tokens stay out of listings
            let rows: Vec<serde_json::Value> = accounts
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "username": a.username,
                        "steam_id": a.steam_id,
                        "is_prime": a.is_prime,
                        "profile_picture_url": a.profile_picture_url,
                    })
                })
                .collect();
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| Error::invalid_input(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        if accounts.is_empty() {
            println!("No saved accounts");
            return Ok(());
        }

        println!("{:<32} {:<20} {:<6}", "USERNAME", "STEAM ID", "PRIME");
        println!("{}", "-".repeat(60));
        for account in &accounts {
            println!(
                "{:<32} {:<20} {:<6}",
                account.username,
                account.steam_id,
                if account.is_prime { "yes" } else { "no" }
            );
        }
        Ok(())
    }
}

// ============================================================================
// Add Command
// ============================================================================

/// Save an account
#[derive(Args, Debug)]
pub struct AddCmd {
    /// Account name.
    pub username: String,

    /// Bearer token; its subject becomes the account id.
    pub token: String,
}

impl AddCmd {
    pub fn run(self, store: &AccountStore) -> Result<()> {
        let steam_id = token::decode_subject(self.token.trim())?;
        if store.add_account(&self.username, &self.token, &steam_id)? {
            println!("Added {} ({})", self.username.trim(), steam_id);
        } else {
            println!("Account {} is already saved", self.username.trim());
        }
        Ok(())
    }
}

// ============================================================================
// Delete Command
// ============================================================================

/// Delete a saved account
#[derive(Args, Debug)]
pub struct DeleteCmd {
    /// Account name.
    pub username: String,
}

impl DeleteCmd {
    pub fn run(self, store: &AccountStore) -> Result<()> {
        if !store.delete_account(&self.username)? {
            return Err(Error::AccountNotFound(self.username));
        }
        println!("Deleted {}", self.username);
        Ok(())
    }
}

// ============================================================================
// Clear Command
// ============================================================================

/// Delete every saved account
#[derive(Args, Debug)]
pub struct ClearCmd {
    /// Confirm deletion.
    #[arg(long)]
    pub yes: bool,
}

impl ClearCmd {
    pub fn run(self, store: &AccountStore) -> Result<()> {
        if !self.yes {
            return Err(Error::invalid_input("refusing to delete every account without --yes"));
        }
        let removed = store.clear()?;
        println!("Deleted {} account(s)", removed);
        Ok(())
    }
}

// ============================================================================
// Refresh Command
// ============================================================================

/// Look up prime status and avatars on the community site
#[derive(Args, Debug)]
pub struct RefreshCmd {
    /// Only refresh this account.
    pub username: Option<String>,
}

impl RefreshCmd {
    pub fn run(self, store: &AccountStore, config: &AppConfig) -> Result<()> {
        let accounts = match &self.username {
            Some(name) => vec![store
                .get(name)?
                .ok_or_else(|| Error::AccountNotFound(name.clone()))?],
            None => store.list_accounts()?,
        };

        let client = ProfileClient::new(&config.profile)?;
        let mut refreshed = 0;
        let mut failed = 0;
        for account in &accounts {
            match client.lookup(&account.steam_id) {
                Ok(profile) => {
                    let avatar = profile.avatar_url.as_deref().unwrap_or_default();
                    store.set_profile(&account.username, profile.is_prime, avatar)?;
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(username = %account.username, error = %e, "profile lookup failed");
                    failed += 1;
                }
            }
        }

        println!("Refreshed {} account(s), {} failed", refreshed, failed);
        Ok(())
    }
}

// ============================================================================
// Import / Export
// ============================================================================

/// Import `username----token` lines
#[derive(Args, Debug)]
pub struct ImportCmd {
    /// File to read, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub source: PathBuf,
}

impl ImportCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let text = read_input(&self.source)?;
        let store = AccountStore::open_default(config)?;
        let summary = interchange::import_into(&store, &text)?;

        println!(
            "Imported {} account(s), {} already saved, {} rejected",
            summary.added, summary.duplicates, summary.rejected
        );
        if summary.added == 0 && summary.duplicates == 0 {
            return Err(Error::invalid_input(
                "no valid accounts found; expected one `username----token` per line",
            ));
        }
        Ok(())
    }
}

/// Export saved accounts
#[derive(Args, Debug)]
pub struct ExportCmd {
    /// File to write, or `-` for stdout.
    #[arg(value_name = "FILE", default_value = "-")]
    pub dest: PathBuf,
}

impl ExportCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let store = AccountStore::open_default(config)?;
        let text = interchange::export_from(&store)?;
        if text.is_empty() {
            return Err(Error::invalid_input("no saved accounts to export"));
        }
        write_output(&self.dest, &text)?;
        if self.dest.as_os_str() != "-" {
            eprintln!("Exported {} account(s) to {}", text.lines().count(), self.dest.display());
        }
        Ok(())
    }
}
