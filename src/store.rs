//! The client's on-disk and OS-level login state.
//!
//! [`CredentialStore`] finds the client installation, reads and writes the
//! auto-login marker, and replaces the three configuration documents. Every
//! document write goes through [`CredentialStore::write_atomically`], which
//! retries when the client has relocked the file.

use crate::config::{ClientConfig, Timings};
use crate::documents::{INSTALL_CONFIG_FILE, LOGIN_HISTORY_FILE, MACHINE_CACHE_FILE};
use crate::error::{Error, Result};
use crate::platform::{ProcessTable, UserRegistry, VALUE_AUTO_LOGIN_USER, VALUE_INSTALL_PATH};
use crate::process::{sleep, ProcessController};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Client executable inside the install directory.
pub const EXECUTABLE_NAME: &str = "steam.exe";

/// Process whose image path reveals the install directory.
const MAIN_PROCESS: &str = "steam";

/// Install directories probed when nothing else points at one.
pub const CONVENTIONAL_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files (x86)\Steam",
    r"C:\Program Files\Steam",
    r"D:\Program Files (x86)\Steam",
    r"D:\Program Files\Steam",
];

/// Write attempts per document before giving up.
pub const WRITE_ATTEMPTS: u32 = 3;

/// Every path a switch touches for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPaths {
    /// Install directory.
    pub install_dir: PathBuf,
    /// `<install>/config`.
    pub config_dir: PathBuf,
    /// `<install>/config/config.vdf`.
    pub install_config: PathBuf,
    /// `<install>/config/loginusers.vdf`.
    pub login_history: PathBuf,
    /// Machine-local cache document.
    pub machine_cache: PathBuf,
    /// `<install>/steam.exe`.
    pub executable: PathBuf,
}

impl ClientPaths {
    /// Derive all paths from an install directory and the machine cache location.
    pub fn new(install_dir: impl Into<PathBuf>, machine_cache: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let config_dir = install_dir.join("config");
        Self {
            install_config: config_dir.join(INSTALL_CONFIG_FILE),
            login_history: config_dir.join(LOGIN_HISTORY_FILE),
            executable: install_dir.join(EXECUTABLE_NAME),
            machine_cache: machine_cache.into(),
            config_dir,
            install_dir,
        }
    }
}

/// Default machine cache location: `<local app data>/Steam/local.vdf`.
pub fn default_machine_cache_path() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| Error::unsupported("could not determine local app data directory"))?;
    Ok(base.join("Steam").join(MACHINE_CACHE_FILE))
}

/// Executable path from a registered open command.
///
/// Handles both `"C:\Path With Spaces\steam.exe" -- "%1"` and the unquoted
/// `C:\Steam\steam.exe -- "%1"` forms.
pub fn parse_open_command(command: &str) -> Option<PathBuf> {
    let command = command.trim();
    let exe = match command.strip_prefix('"') {
        Some(rest) => rest.split('"').next()?,
        None => command.split_whitespace().next()?,
    };
    if exe.is_empty() {
        return None;
    }
    Some(PathBuf::from(exe))
}

/// How an existing target is treated before the new content lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Replace the target in place.
    Overwrite,
    /// Delete the target first; its content must never be merged.
    DeleteFirst,
}

/// Locates the client and writes its login state.
pub struct CredentialStore {
    registry: Arc<dyn UserRegistry>,
    processes: Arc<dyn ProcessTable>,
    client: ClientConfig,
    timings: Timings,
    candidates: Vec<PathBuf>,
}

impl CredentialStore {
    /// Create a store probing the conventional install directories last.
    pub fn new(
        registry: Arc<dyn UserRegistry>,
        processes: Arc<dyn ProcessTable>,
        client: ClientConfig,
        timings: Timings,
    ) -> Self {
        Self {
            registry,
            processes,
            client,
            timings,
            candidates: CONVENTIONAL_INSTALL_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replace the list of conventional install directories.
    pub fn with_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Locate the client installation.
    ///
    /// A configured `install_path` is used as-is. Otherwise the first
    /// existing directory from, in order: the client's own registry value,
    /// the image path of a running client process, the registered open
    /// command, and the conventional install directories (which must also
    /// contain the executable).
    pub fn resolve_install_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.client.install_path {
            if path.is_dir() {
                return Ok(path.clone());
            }
            tracing::warn!(path = %path.display(), "configured install path does not exist");
            return Err(Error::InstallNotFound);
        }

        match self.registry.client_value(VALUE_INSTALL_PATH) {
            Ok(Some(value)) => {
                let path = PathBuf::from(value);
                if path.is_dir() {
                    tracing::debug!(path = %path.display(), "install path from registry");
                    return Ok(path);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "install path registry lookup failed"),
        }

        match self.processes.find(MAIN_PROCESS) {
            Ok(found) => {
                let dir = found
                    .iter()
                    .filter_map(|p| p.exe.as_deref()?.parent())
                    .find(|dir| dir.is_dir());
                if let Some(dir) = dir {
                    tracing::debug!(path = %dir.display(), "install path from running process");
                    return Ok(dir.to_path_buf());
                }
            }
            Err(e) => tracing::debug!(error = %e, "process lookup failed"),
        }

        match self.registry.open_command() {
            Ok(Some(command)) => {
                let dir = parse_open_command(&command)
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                    .filter(|dir| dir.is_dir());
                if let Some(dir) = dir {
                    tracing::debug!(path = %dir.display(), "install path from open command");
                    return Ok(dir);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "open command lookup failed"),
        }

        for candidate in &self.candidates {
            if candidate.is_dir() && candidate.join(EXECUTABLE_NAME).is_file() {
                tracing::debug!(path = %candidate.display(), "install path from conventional location");
                return Ok(candidate.clone());
            }
        }

        Err(Error::InstallNotFound)
    }

    /// Machine cache location, honoring the configured override.
    pub fn machine_cache_path(&self) -> Result<PathBuf> {
        match &self.client.machine_cache_path {
            Some(path) => Ok(path.clone()),
            None => default_machine_cache_path(),
        }
    }

    /// Resolve the install and derive every path a switch touches.
    pub fn resolve_paths(&self) -> Result<ClientPaths> {
        let install = self.resolve_install_path()?;
        Ok(ClientPaths::new(install, self.machine_cache_path()?))
    }

    /// Account the client will log into on its next start.
    pub fn current_user(&self) -> Result<Option<String>> {
        self.registry.client_value(VALUE_AUTO_LOGIN_USER)
    }

    /// Point the client's auto-login marker at `account`.
    pub fn set_active_user(&self, account: &str) -> Result<()> {
        self.registry
            .set_client_value(VALUE_AUTO_LOGIN_USER, account)
            .map_err(|e| Error::active_user(account, e.to_string()))?;
        tracing::info!(account = %account, "active user set");
        Ok(())
    }

    /// Make sure `<install>/config` and the machine cache directory exist.
    pub fn ensure_dirs(&self, paths: &ClientPaths) -> Result<()> {
        std::fs::create_dir_all(&paths.config_dir)?;
        if let Some(parent) = paths.machine_cache.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Delete a leftover machine cache document.
    ///
    /// A failed delete is retried once after the purge retry delay. Returns
    /// whether a file was removed.
    pub fn purge_stale_cache(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        remove_with_retry(path, self.timings.purge_retry, || remove_file_forced(path))?;
        tracing::debug!(path = %path.display(), "removed stale machine cache");
        Ok(true)
    }

    /// Replace `path` with `content`.
    ///
    /// A read-only attribute is cleared first. With [`ReplaceMode::DeleteFirst`]
    /// an existing file is removed before writing. The content is written to
    /// a sibling temporary file and renamed into place. When the OS denies
    /// access, `restop` is invoked and the write retried, up to
    /// [`WRITE_ATTEMPTS`] attempts in total; the last denial is returned as
    /// [`Error::AccessDenied`].
    pub fn write_atomically(
        &self,
        path: &Path,
        content: &str,
        mode: ReplaceMode,
        restop: &mut dyn FnMut(),
    ) -> Result<()> {
        write_with_retry(
            path,
            WRITE_ATTEMPTS,
            self.timings.write_retry,
            || replace_file(path, content.as_bytes(), mode),
            restop,
        )
    }

    /// Copy the three live documents into `backup_dir`.
    ///
    /// Single slot: earlier copies are overwritten. Missing documents are
    /// skipped and per-file copy failures only logged. Returns the number of
    /// documents copied.
    pub fn save_snapshot(&self, paths: &ClientPaths, backup_dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(backup_dir)?;

        let mut copied = 0;
        for (source, name) in [
            (&paths.install_config, INSTALL_CONFIG_FILE),
            (&paths.login_history, LOGIN_HISTORY_FILE),
            (&paths.machine_cache, MACHINE_CACHE_FILE),
        ] {
            if !source.is_file() {
                continue;
            }
            match std::fs::copy(source, backup_dir.join(name)) {
                Ok(_) => copied += 1,
                Err(e) => {
                    tracing::warn!(source = %source.display(), error = %e, "snapshot copy failed")
                }
            }
        }

        tracing::info!(dir = %backup_dir.display(), copied, "snapshot saved");
        Ok(copied)
    }

    /// Resolve the install and snapshot it into `backup_dir`.
    ///
    /// Best effort: any failure is logged and yields `None`.
    pub fn try_snapshot(&self, backup_dir: &Path) -> Option<usize> {
        match self
            .resolve_paths()
            .and_then(|paths| self.save_snapshot(&paths, backup_dir))
        {
            Ok(copied) => Some(copied),
            Err(e) => {
                tracing::warn!(dir = %backup_dir.display(), error = %e, "skipping snapshot");
                None
            }
        }
    }

    /// Wipe the client's local state and start it fresh.
    ///
    /// Stops the client, deletes `<install>/userdata`, `<install>/config` and
    /// the machine cache, then launches the client.
    pub fn reset_client(&self, controller: &ProcessController) -> Result<ClientPaths> {
        controller.stop_all();
        let paths = self.resolve_paths()?;

        for dir in [paths.install_dir.join("userdata"), paths.config_dir.clone()] {
            if dir.is_dir() {
                std::fs::remove_dir_all(&dir)?;
                tracing::info!(dir = %dir.display(), "removed");
            }
        }
        if paths.machine_cache.exists() {
            remove_file_forced(&paths.machine_cache)?;
        }

        controller.start(&paths.executable)?;
        Ok(paths)
    }
}

/// Retry core behind [`CredentialStore::write_atomically`].
///
/// Only `PermissionDenied` is retried; other errors are returned at once.
pub(crate) fn write_with_retry<W>(
    path: &Path,
    attempts: u32,
    wait: std::time::Duration,
    mut write: W,
    restop: &mut dyn FnMut(),
) -> Result<()>
where
    W: FnMut() -> io::Result<()>,
{
    let mut attempt = 1;
    loop {
        match write() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), attempt, "written");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                if attempt >= attempts {
                    return Err(Error::AccessDenied {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "write denied, stopping client again"
                );
                restop();
                sleep(wait);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Retry core behind [`CredentialStore::purge_stale_cache`]: one retry
/// after `wait`, then the second error is returned.
pub(crate) fn remove_with_retry<R>(path: &Path, wait: std::time::Duration, mut remove: R) -> Result<()>
where
    R: FnMut() -> io::Result<()>,
{
    if let Err(first) = remove() {
        tracing::warn!(path = %path.display(), error = %first, "could not delete cache, retrying");
        sleep(wait);
        remove()?;
    }
    Ok(())
}

fn clear_readonly(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let mut perms = metadata.permissions();
    if !perms.readonly() {
        return Ok(());
    }

    // Owner write only; other permission bits stay as they were
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);

    std::fs::set_permissions(path, perms)
}

fn remove_file_forced(path: &Path) -> io::Result<()> {
    clear_readonly(path)?;
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn replace_file(path: &Path, content: &[u8], mode: ReplaceMode) -> io::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    clear_readonly(path)?;
    if mode == ReplaceMode::DeleteFirst {
        remove_file_forced(path)?;
    }

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);

    let result = std::fs::write(&tmp_path, content).and_then(|()| std::fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}
