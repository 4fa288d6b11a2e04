//! Account switching commands.

use cachelogin::{AccountStore, AppConfig, Error, Result, SessionSwitcher, SwitchRequest};
use clap::Args;

/// Switch to a saved account
#[derive(Args, Debug)]
pub struct LoginCmd {
    /// Saved account name.
    pub username: String,

    /// Start the client after switching.
    #[arg(long)]
    pub start: bool,

    /// Snapshot the current login documents before switching.
    #[arg(long)]
    pub backup: bool,
}

impl LoginCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let store = AccountStore::open_default(config)?;
        let token = store
            .get_token(&self.username)?
            .ok_or_else(|| Error::AccountNotFound(self.username.clone()))?;

        switch(config, self.username, token, self.start, self.backup)
    }
}

/// Switch to an account using an explicit token
#[derive(Args, Debug)]
pub struct SwitchCmd {
    /// Account name (an e-mail address is reduced to its local part).
    pub account: String,

    /// Bearer token for the account.
    pub token: String,

    /// Start the client after switching.
    #[arg(long)]
    pub start: bool,

    /// Snapshot the current login documents before switching.
    #[arg(long)]
    pub backup: bool,
}

impl SwitchCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        switch(config, self.account, self.token, self.start, self.backup)
    }
}

fn switch(config: &AppConfig, account: String, token: String, start: bool, backup: bool) -> Result<()> {
    let mut switcher = SessionSwitcher::native(config);

    if backup {
        backup_before_switch(&switcher, config);
    }

    let report = switcher.do_login(&SwitchRequest {
        account,
        token,
        start_client: start,
    });
    let message = report.into_result()?;
    println!("{}", message);
    Ok(())
}

/// Snapshot the live documents. Failures are logged and never stop a switch.
fn backup_before_switch(switcher: &SessionSwitcher, config: &AppConfig) {
    match config.backup_dir() {
        Ok(dir) => {
            if let Some(copied) = switcher.store().try_snapshot(&dir) {
                println!("Backed up {} document(s)", copied);
            }
        }
        Err(e) => tracing::warn!(error = %e, "skipping backup"),
    }
}
