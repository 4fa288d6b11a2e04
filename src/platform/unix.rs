//! Unix process table backed by `/proc` and signals.
//!
//! The client keeps its per-user settings in the Windows registry, which has
//! no counterpart here, so [`NoRegistry`] reads nothing and refuses writes.

use super::{image_name_matches, ProcessEntry, ProcessTable, UserRegistry};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const PROC_ROOT: &str = "/proc";

/// Process table scanning `/proc`.
///
/// `comm` is cut to 15 bytes by the kernel, so a process is matched on the
/// file name of its executable or of `argv[0]` first and on `comm` last.
pub struct ProcProcessTable;

/// Candidate image names for one `/proc/<pid>` directory, most reliable first.
fn image_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();

    if let Ok(exe) = std::fs::read_link(dir.join("exe")) {
        if let Some(file) = exe.file_name() {
            let file = file.to_string_lossy();
            names.push(file.trim_end_matches(" (deleted)").to_string());
        }
    }

    if let Ok(cmdline) = std::fs::read(dir.join("cmdline")) {
        let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
        if let Some(file) = Path::new(&*String::from_utf8_lossy(argv0)).file_name() {
            names.push(file.to_string_lossy().into_owned());
        }
    }

    if let Ok(comm) = std::fs::read_to_string(dir.join("comm")) {
        names.push(comm.trim().to_string());
    }

    names.retain(|n| !n.is_empty());
    names
}

impl ProcessTable for ProcProcessTable {
    fn find(&self, name: &str) -> Result<Vec<ProcessEntry>> {
        let entries = match std::fs::read_dir(PROC_ROOT) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "process table unavailable");
                return Ok(Vec::new());
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };

            // Processes can exit while we scan; an empty list just skips them
            let dir = entry.path();
            let Some(matched) = image_names(&dir).into_iter().find(|n| image_name_matches(n, name)) else {
                continue;
            };

            let exe: Option<PathBuf> = std::fs::read_link(dir.join("exe")).ok();
            found.push(ProcessEntry {
                pid,
                name: matched,
                exe,
            });
        }

        Ok(found)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| Error::invalid_input(format!("pid out of range: {}", pid)))?;

        let result = unsafe { libc::kill(pid, libc::SIGKILL) };
        if result != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn launch(&self, exe: &Path) -> Result<()> {
        Command::new(exe)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch(exe, e.to_string()))?;
        Ok(())
    }
}

/// Registry stand-in for platforms without one.
pub struct NoRegistry;

impl UserRegistry for NoRegistry {
    fn client_value(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set_client_value(&self, name: &str, _value: &str) -> Result<()> {
        Err(Error::unsupported(format!(
            "no per-user registry to store {}",
            name
        )))
    }

    fn open_command(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_nonexistent_process() {
        let table = ProcProcessTable;
        let found = table.find("cachelogin-no-such-process").unwrap();
        assert!(found.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_find_and_terminate_child() {
        let mut child = Command::new("sleep").arg("60").spawn().expect("spawn sleep");
        let pid = child.id();

        let table = ProcProcessTable;
        let found = table.find("sleep").unwrap();
        assert!(found.iter().any(|p| p.pid == pid), "sleep child should be listed");

        table.terminate(pid).unwrap();
        let status = child.wait().expect("wait child");
        assert!(!status.success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_find_matches_names_longer_than_comm() {
        // comm would read "steamerrorrepor"
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("steamerrorreporter");
        std::fs::copy("/bin/sleep", &exe).expect("copy sleep");

        let mut child = Command::new(&exe).arg("60").spawn().expect("spawn copy");
        let pid = child.id();

        let found = ProcProcessTable.find("steamerrorreporter").unwrap();
        let _ = child.kill();
        let _ = child.wait();

        let entry = found.iter().find(|p| p.pid == pid).expect("long-named child listed");
        assert_eq!(entry.name, "steamerrorreporter");
    }

    #[test]
    fn test_launch_missing_executable() {
        let err = ProcProcessTable
            .launch(Path::new("/nonexistent/steam"))
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[test]
    fn test_no_registry_refuses_writes() {
        assert!(NoRegistry.client_value("SteamPath").unwrap().is_none());
        assert!(matches!(
            NoRegistry.set_client_value("AutoLoginUser", "alice"),
            Err(Error::Unsupported(_))
        ));
    }
}
