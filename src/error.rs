//! Error types for cachelogin.

use crate::token::TokenError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using cachelogin's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
///
/// Callers use this to decide whether a failure is worth retrying and how to
/// present it; the variant itself carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed token, empty account name or other bad input.
    Input,
    /// Install path, executable or OS facility could not be found.
    Discovery,
    /// OS marker, keystore or file write denied.
    Permission,
    /// Transient file, directory or storage failure.
    Io,
    /// Client process could not be launched.
    Process,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Input => write!(f, "input"),
            ErrorKind::Discovery => write!(f, "discovery"),
            ErrorKind::Permission => write!(f, "permission"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Process => write!(f, "process"),
        }
    }
}

/// Errors that can occur in cachelogin operations.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    /// The bearer token could not be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Generic invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No stored account with this name.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    // Discovery errors
    /// The client installation directory could not be located.
    #[error("client installation path not found")]
    InstallNotFound,

    /// The client executable is missing from the install directory.
    #[error("client executable not found at: {}", path.display())]
    ExecutableNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// An OS facility required for the operation does not exist here.
    #[error("unsupported on this platform: {0}")]
    Unsupported(String),

    // Permission errors
    /// Writing the OS-level active user marker failed.
    #[error("failed to set active user {account:?}: {message}")]
    ActiveUser {
        /// Account that was being set.
        account: String,
        /// OS error detail.
        message: String,
    },

    /// A file stayed locked after every retry.
    #[error("access denied writing {}: {source}", path.display())]
    AccessDenied {
        /// File that could not be written.
        path: PathBuf,
        /// Last error returned by the OS.
        #[source]
        source: std::io::Error,
    },

    /// The OS credential protection facility failed.
    #[error("keystore error: {0}")]
    Keystore(String),

    // Process errors
    /// Launching the client failed.
    #[error("failed to launch {}: {message}", path.display())]
    Launch {
        /// Executable that was launched.
        path: PathBuf,
        /// OS error detail.
        message: String,
    },

    /// A session switch ended in failure.
    #[error("{message}")]
    SwitchFailed {
        /// Classification of the failed step.
        kind: ErrorKind,
        /// User-facing message.
        message: String,
    },

    // Storage and configuration errors
    /// Account database error.
    #[error("database error: {0}")]
    Database(String),

    /// Failed to load configuration.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Failed to save configuration.
    #[error("failed to save config: {0}")]
    ConfigSave(String),

    /// The account generation service returned an error.
    #[error("account generation failed: {0}")]
    Generator(String),

    /// A community profile page could not be fetched.
    #[error("profile lookup failed: {0}")]
    Profile(String),

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid input error with a message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unsupported-platform error with a message.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a keystore error with a message.
    pub fn keystore(msg: impl Into<String>) -> Self {
        Self::Keystore(msg.into())
    }

    /// Create an active user marker error.
    pub fn active_user(account: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActiveUser {
            account: account.into(),
            message: message.into(),
        }
    }

    /// Create a launch error.
    pub fn launch(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Launch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a database error from any displayable source.
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidToken(_) | Error::InvalidInput(_) | Error::AccountNotFound(_) => {
                ErrorKind::Input
            }
            Error::InstallNotFound | Error::ExecutableNotFound { .. } | Error::Unsupported(_) => {
                ErrorKind::Discovery
            }
            Error::ActiveUser { .. } | Error::AccessDenied { .. } | Error::Keystore(_) => {
                ErrorKind::Permission
            }
            Error::Launch { .. } => ErrorKind::Process,
            Error::SwitchFailed { kind, .. } => *kind,
            Error::Database(_)
            | Error::ConfigLoad(_)
            | Error::ConfigSave(_)
            | Error::Generator(_)
            | Error::Profile(_)
            | Error::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_not_found_includes_path() {
        let err = Error::ExecutableNotFound {
            path: PathBuf::from("/opt/steam/steam.exe"),
        };
        let msg = err.to_string();
        assert!(msg.contains("executable not found"));
        assert!(msg.contains("/opt/steam/steam.exe"), "Error should include the path");
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }

    #[test]
    fn test_access_denied_keeps_os_error() {
        let err = Error::AccessDenied {
            path: PathBuf::from("config.vdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is locked"),
        };
        let msg = err.to_string();
        assert!(msg.contains("config.vdf"));
        assert!(msg.contains("file is locked"), "Error should include the OS detail");
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn test_token_errors_are_input() {
        let err: Error = TokenError::MissingSubject.into();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().starts_with("invalid token"));
    }

    #[test]
    fn test_active_user_includes_account() {
        let err = Error::active_user("alice", "access is denied");
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("access is denied"));
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn test_switch_failed_keeps_kind_and_message() {
        let err = Error::SwitchFailed {
            kind: ErrorKind::Discovery,
            message: "Steam installation path not found".to_string(),
        };
        assert_eq!(err.to_string(), "Steam installation path not found");
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }

    #[test]
    fn test_launch_is_process_error() {
        let err = Error::launch("/x/steam.exe", "bad format");
        assert_eq!(err.kind(), ErrorKind::Process);
        assert_eq!(Error::Io(std::io::Error::other("x")).kind(), ErrorKind::Io);
    }
}
