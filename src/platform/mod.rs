//! OS surfaces touched while switching sessions.
//!
//! The switching logic never talks to the OS directly. It goes through
//! these traits so each platform supplies its own implementation:
//!
//! - [`ProcessTable`]: enumerate, terminate and launch processes
//! - [`UserRegistry`]: the per-user key/value store the client reads its
//!   install path and auto-login user from
//!
//! [`native`] returns the implementations for the current platform.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Registry value holding the client's install directory.
pub const VALUE_INSTALL_PATH: &str = "SteamPath";

/// Registry value holding the account the client logs into on start.
pub const VALUE_AUTO_LOGIN_USER: &str = "AutoLoginUser";

/// A running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// OS process id.
    pub pid: u32,
    /// Image name without extension, as matched against.
    pub name: String,
    /// Full path of the executable, when the OS exposes it.
    pub exe: Option<PathBuf>,
}

/// Process enumeration and control.
pub trait ProcessTable: Send + Sync {
    /// All processes whose image name matches `name` (case-insensitive, no extension).
    fn find(&self, name: &str) -> Result<Vec<ProcessEntry>>;

    /// Forcibly terminate a process.
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Launch an executable detached from this process.
    fn launch(&self, exe: &Path) -> Result<()>;
}

/// The client's per-user settings store.
pub trait UserRegistry: Send + Sync {
    /// Read a string value from the client's settings key.
    fn client_value(&self, name: &str) -> Result<Option<String>>;

    /// Write a string value to the client's settings key.
    fn set_client_value(&self, name: &str, value: &str) -> Result<()>;

    /// Command registered to open the client's URL scheme, if any.
    fn open_command(&self) -> Result<Option<String>>;
}

/// Native process table and registry for the current platform.
pub fn native() -> (Arc<dyn ProcessTable>, Arc<dyn UserRegistry>) {
    #[cfg(windows)]
    {
        (
            Arc::new(windows::WindowsProcessTable),
            Arc::new(windows::WindowsRegistry),
        )
    }
    #[cfg(unix)]
    {
        (Arc::new(unix::ProcProcessTable), Arc::new(unix::NoRegistry))
    }
}

/// Compare a process image name against a wanted name.
///
/// The comparison ignores case and a trailing `.exe`.
pub fn image_name_matches(image: &str, wanted: &str) -> bool {
    let image = image.trim();
    let stem = match image.len().checked_sub(4) {
        Some(split) if image.is_char_boundary(split) && image[split..].eq_ignore_ascii_case(".exe") => {
            &image[..split]
        }
        _ => image,
    };
    stem.eq_ignore_ascii_case(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name_matches() {
        assert!(image_name_matches("steam.exe", "steam"));
        assert!(image_name_matches("Steam.EXE", "steam"));
        assert!(image_name_matches("steam", "steam"));
        assert!(image_name_matches("steamwebhelper\n", "steamwebhelper"));
        assert!(!image_name_matches("steamwebhelper.exe", "steam"));
        assert!(!image_name_matches("steam.exe.bak", "steam"));
        assert!(!image_name_matches("exe", "steam"));
    }
}
