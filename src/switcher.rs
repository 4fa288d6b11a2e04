//! Session switching.
//!
//! [`SessionSwitcher::do_login`] runs the whole switch as one sequential
//! operation:
//!
//! ```text
//! Idle -> NormalizingInput -> DecodingToken -> StoppingClient -> ResolvingPath
//!      -> PurgingStaleCache -> SettingOsMarker -> WritingDocuments
//!      -> [StartingClient] -> Done
//! ```
//!
//! Any step can end in `Failed`. Nothing is rolled back: a failure after the
//! marker step leaves the marker pointing at the new account while the
//! documents may be stale, and re-running the switch repairs it.
//!
//! `do_login` takes `&mut self`, so one switcher never runs two switches at
//! once. Callers sharing an installation between switchers must serialize
//! them.

use crate::checksum::format_cache_key;
use crate::cipher::{self, CredentialProtector};
use crate::config::{AppConfig, Timings};
use crate::documents::{self, SessionNonce};
use crate::error::{Error, ErrorKind};
use crate::platform;
use crate::process::{sleep, ProcessController};
use crate::store::{CredentialStore, ReplaceMode};
use crate::token;
use std::sync::Arc;

/// Progress of a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchState {
    /// Nothing started.
    Idle,
    /// Reducing the account name to its local part.
    NormalizingInput,
    /// Extracting the subject id from the token.
    DecodingToken,
    /// Terminating the client.
    StoppingClient,
    /// Locating the installation.
    ResolvingPath,
    /// Removing the old machine cache.
    PurgingStaleCache,
    /// Writing the auto-login marker.
    SettingOsMarker,
    /// Building and writing the three documents.
    WritingDocuments,
    /// Launching the client.
    StartingClient,
    /// Switch complete.
    Done,
    /// Switch aborted.
    Failed {
        /// User-facing reason.
        reason: String,
    },
}

impl SwitchState {
    /// Check if the switch has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwitchState::Done | SwitchState::Failed { .. })
    }

    /// Get the state name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            SwitchState::Idle => "idle",
            SwitchState::NormalizingInput => "normalizing_input",
            SwitchState::DecodingToken => "decoding_token",
            SwitchState::StoppingClient => "stopping_client",
            SwitchState::ResolvingPath => "resolving_path",
            SwitchState::PurgingStaleCache => "purging_stale_cache",
            SwitchState::SettingOsMarker => "setting_os_marker",
            SwitchState::WritingDocuments => "writing_documents",
            SwitchState::StartingClient => "starting_client",
            SwitchState::Done => "done",
            SwitchState::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchState::Failed { reason } => write!(f, "failed: {}", reason),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Input to a switch.
#[derive(Debug, Clone)]
pub struct SwitchRequest {
    /// Account name; anything from `@` on is dropped.
    pub account: String,
    /// Bearer token for the account.
    pub token: String,
    /// Launch the client once the documents are written.
    pub start_client: bool,
}

/// Outcome status of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStatus {
    /// Every step completed.
    Success,
    /// A step failed.
    Error,
}

impl SwitchStatus {
    /// `"Success"` or `"Error"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchStatus::Success => "Success",
            SwitchStatus::Error => "Error",
        }
    }
}

/// Result of [`SessionSwitcher::do_login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReport {
    /// Outcome.
    pub status: SwitchStatus,
    /// Message to show verbatim.
    pub message: String,
    /// Classification of the failure, if any.
    pub kind: Option<ErrorKind>,
}

impl SwitchReport {
    fn success(message: impl Into<String>) -> Self {
        Self {
            status: SwitchStatus::Success,
            message: message.into(),
            kind: None,
        }
    }

    /// Whether the switch succeeded.
    pub fn is_success(&self) -> bool {
        self.status == SwitchStatus::Success
    }

    /// `(status, message)` pair.
    pub fn as_pair(&self) -> (&'static str, &str) {
        (self.status.as_str(), &self.message)
    }

    /// The success message, or the failure as [`Error::SwitchFailed`].
    pub fn into_result(self) -> crate::Result<String> {
        match self.status {
            SwitchStatus::Success => Ok(self.message),
            SwitchStatus::Error => Err(Error::SwitchFailed {
                kind: self.kind.unwrap_or(ErrorKind::Io),
                message: self.message,
            }),
        }
    }
}

/// A failed step: what to tell the user and what kind of error caused it.
struct StepFailure {
    message: String,
    kind: ErrorKind,
}

impl StepFailure {
    fn new(message: impl Into<String>, err: &Error) -> Self {
        Self {
            message: message.into(),
            kind: err.kind(),
        }
    }
}

/// Reduce login-style input (`alice@example.com`) to the account name.
pub fn normalize_account(input: &str) -> &str {
    let local = match input.split_once('@') {
        Some((local, _)) => local,
        None => input,
    };
    local.trim()
}

/// Switches the client to another account.
pub struct SessionSwitcher {
    processes: ProcessController,
    store: CredentialStore,
    protector: Arc<dyn CredentialProtector>,
    timings: Timings,
    state: SwitchState,
}

impl SessionSwitcher {
    /// Create a switcher from its collaborators.
    pub fn new(
        processes: ProcessController,
        store: CredentialStore,
        protector: Arc<dyn CredentialProtector>,
        timings: Timings,
    ) -> Self {
        Self {
            processes,
            store,
            protector,
            timings,
            state: SwitchState::Idle,
        }
    }

    /// Create a switcher using the OS process table, registry and keystore.
    pub fn native(config: &AppConfig) -> Self {
        let (table, registry) = platform::native();
        let processes = ProcessController::new(
            table.clone(),
            config.client.process_names.clone(),
            config.timings.clone(),
        );
        let store = CredentialStore::new(registry, table, config.client.clone(), config.timings.clone());
        Self::new(processes, store, cipher::native_protector(), config.timings.clone())
    }

    /// State reached by the last switch.
    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    /// Process controller used by this switcher.
    pub fn processes(&self) -> &ProcessController {
        &self.processes
    }

    /// Credential store used by this switcher.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn transition(&mut self, next: SwitchState) {
        tracing::debug!(from = %self.state, to = %next, "switch state");
        self.state = next;
    }

    /// Switch the client to `request.account`.
    ///
    /// Never returns an error: every failure becomes an `Error` report whose
    /// message is meant to be shown as-is.
    pub fn do_login(&mut self, request: &SwitchRequest) -> SwitchReport {
        self.state = SwitchState::Idle;

        match self.run(request) {
            Ok(()) => {
                self.transition(SwitchState::Done);
                SwitchReport::success("Login configured successfully.")
            }
            Err(failure) => {
                tracing::warn!(kind = %failure.kind, reason = %failure.message, "switch failed");
                self.transition(SwitchState::Failed {
                    reason: failure.message.clone(),
                });
                SwitchReport {
                    status: SwitchStatus::Error,
                    message: failure.message,
                    kind: Some(failure.kind),
                }
            }
        }
    }

    fn run(&mut self, request: &SwitchRequest) -> std::result::Result<(), StepFailure> {
        self.transition(SwitchState::NormalizingInput);
        let account = normalize_account(&request.account);
        if account.is_empty() {
            let err = Error::invalid_input("account name is empty");
            return Err(StepFailure::new("Invalid account name - account name is empty", &err));
        }

        self.transition(SwitchState::DecodingToken);
        let subject = token::decode_subject(&request.token).map_err(|e| {
            let message = format!("Invalid token - {}", e);
            StepFailure::new(message, &Error::from(e))
        })?;
        tracing::info!(account = %account, subject = %subject, "switching account");

        self.transition(SwitchState::StoppingClient);
        self.processes.stop_all();
        sleep(self.timings.post_stop_settle);

        self.transition(SwitchState::ResolvingPath);
        let paths = self.store.resolve_paths().map_err(|e| match e {
            Error::InstallNotFound => StepFailure::new("Steam installation path not found", &e),
            other => StepFailure::new(format!("Failed to resolve Steam paths: {}", other), &other),
        })?;

        self.transition(SwitchState::PurgingStaleCache);
        self.store.purge_stale_cache(&paths.machine_cache).map_err(|e| {
            let message = format!(
                "Cannot delete existing local cache file. Steam may still be running. Error: {}",
                e
            );
            StepFailure::new(message, &e)
        })?;
        self.store
            .ensure_dirs(&paths)
            .map_err(|e| StepFailure::new(format!("Failed to create config directory: {}", e), &e))?;

        self.transition(SwitchState::SettingOsMarker);
        self.store
            .set_active_user(account)
            .map_err(|e| StepFailure::new(format!("Failed to set active user: {}", e), &e))?;

        self.transition(SwitchState::WritingDocuments);
        let nonce = SessionNonce::generate(&mut rand::thread_rng());
        let cipher_hex = cipher::bind(self.protector.as_ref(), &request.token, account)
            .map_err(|e| StepFailure::new(format!("Failed to encrypt token: {}", e), &e))?;
        let cache_key = format_cache_key(account);

        let writes = [
            (
                &paths.install_config,
                documents::install_config(&nonce, &subject, account),
                ReplaceMode::Overwrite,
            ),
            (
                &paths.login_history,
                documents::login_history_now(&subject, account),
                ReplaceMode::Overwrite,
            ),
            (
                &paths.machine_cache,
                documents::machine_cache(&cache_key, &cipher_hex),
                ReplaceMode::DeleteFirst,
            ),
        ];

        let processes = &self.processes;
        for (path, document, mode) in writes {
            self.store
                .write_atomically(path, &document.render(), mode, &mut || {
                    processes.stop_all();
                })
                .map_err(|e| match e {
                    Error::AccessDenied { ref source, .. } => StepFailure::new(
                        format!(
                            "Access denied. Please ensure Steam is closed and try again. \
                             If the problem persists, try running as administrator. Error: {}",
                            source
                        ),
                        &e,
                    ),
                    _ => StepFailure::new(format!("Failed to write config files: {}", e), &e),
                })?;
        }

        if request.start_client {
            self.transition(SwitchState::StartingClient);
            self.processes.start(&paths.executable).map_err(|e| match e {
                Error::ExecutableNotFound { ref path } => {
                    StepFailure::new(format!("Steam executable not found at: {}", path.display()), &e)
                }
                _ => StepFailure::new(format!("Failed to start Steam: {}", e), &e),
            })?;
        }

        Ok(())
    }
}
