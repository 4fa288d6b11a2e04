//! The three client configuration documents written during a switch.
//!
//! | Document        | Location                          | Keyed by        |
//! |-----------------|-----------------------------------|-----------------|
//! | install config  | `<install>/config/config.vdf`     | account name    |
//! | login history   | `<install>/config/loginusers.vdf` | subject id      |
//! | machine cache   | `%LOCALAPPDATA%/Steam/local.vdf`  | cache key       |
//!
//! Builders are pure; rendering is done by [`cachelogin_vdf::Document`].

use cachelogin_vdf::Document;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Install config file name inside `<install>/config`.
pub const INSTALL_CONFIG_FILE: &str = "config.vdf";

/// Login history file name inside `<install>/config`.
pub const LOGIN_HISTORY_FILE: &str = "loginusers.vdf";

/// Machine cache file name inside the client's local app data directory.
pub const MACHINE_CACHE_FILE: &str = "local.vdf";

/// Display name written into the login history.
pub const PERSONA_NAME: &str = "nicealts";

const NONCE_DIGITS: usize = 9;

/// Volatile machine-trust-window counter consumed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNonce(String);

impl SessionNonce {
    /// Draw a fresh nonce of nine independent decimal digits.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let digits = (0..NONCE_DIGITS)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(digits)
    }

    /// The nonce digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `InstallConfigStore` document mapping `account_name` to `subject_id`.
pub fn install_config(nonce: &SessionNonce, subject_id: &str, account_name: &str) -> Document {
    let accounts = Document::new().nested(account_name, Document::new().scalar("SteamID", subject_id));

    let steam = Document::new()
        .scalar("AutoUpdateWindowEnabled", "0")
        .nested("Accounts", accounts)
        .scalar("MTBF", nonce.as_str());

    Document::new().nested(
        "InstallConfigStore",
        Document::new().nested("Software", Document::new().nested("Valve", Document::new().nested("Steam", steam))),
    )
}

/// `users` document remembering `account_name` as the most recent login.
pub fn login_history(subject_id: &str, account_name: &str, timestamp: u64) -> Document {
    let user = Document::new()
        .scalar("AccountName", account_name)
        .scalar("PersonaName", PERSONA_NAME)
        .scalar("RememberPassword", "1")
        .scalar("WantsOfflineMode", "0")
        .scalar("SkipOfflineModeWarning", "0")
        .scalar("AllowAutoLogin", "1")
        .scalar("MostRecent", "1")
        .scalar("Timestamp", timestamp.to_string());

    Document::new().nested("users", Document::new().nested(subject_id, user))
}

/// [`login_history`] stamped with the current time.
pub fn login_history_now(subject_id: &str, account_name: &str) -> Document {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    login_history(subject_id, account_name, timestamp)
}

/// `MachineUserConfigStore` document holding the bound credential.
pub fn machine_cache(cache_key: &str, cipher_hex: &str) -> Document {
    let connect_cache = Document::new().scalar(cache_key, cipher_hex);
    let steam = Document::new().nested("ConnectCache", connect_cache);

    Document::new().nested(
        "MachineUserConfigStore",
        Document::new().nested("Software", Document::new().nested("Valve", Document::new().nested("Steam", steam))),
    )
}
