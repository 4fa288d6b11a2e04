//! cachelogin - token-based session switching for the Steam desktop client.
//!
//! Given an account name and a bearer token, cachelogin rewrites the client's
//! login state so the next start resumes as that account:
//!
//! - the auto-login marker in the per-user registry
//! - `config/config.vdf` and `config/loginusers.vdf` in the install
//! - the machine-local `local.vdf` holding the encrypted token
//!
//! # Example
//!
//! ```no_run
//! use cachelogin::{AppConfig, SessionSwitcher, SwitchRequest};
//!
//! let config = AppConfig::load()?;
//! let mut switcher = SessionSwitcher::native(&config);
//! let report = switcher.do_login(&SwitchRequest {
//!     account: "alice@example.com".to_string(),
//!     token: "eyJ...".to_string(),
//!     start_client: true,
//! });
//! println!("{}: {}", report.status.as_str(), report.message);
//! # Ok::<(), cachelogin::Error>(())
//! ```

#![deny(missing_docs)]

pub mod accounts;
pub mod checksum;
pub mod cipher;
pub mod config;
pub mod documents;
pub mod error;
pub mod generator;
pub mod interchange;
pub mod platform;
pub mod process;
pub mod profile;
pub mod store;
pub mod switcher;
pub mod token;

pub use accounts::{Account, AccountStore};
pub use config::AppConfig;
pub use error::{Error, ErrorKind, Result};
pub use process::ProcessController;
pub use store::{ClientPaths, CredentialStore};
pub use switcher::{SessionSwitcher, SwitchReport, SwitchRequest, SwitchState, SwitchStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
