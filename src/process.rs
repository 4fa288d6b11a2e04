//! Stopping, starting and watching the client's processes.

use crate::config::Timings;
use crate::error::{Error, Result};
use crate::platform::ProcessTable;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Controls the client's OS processes.
#[derive(Clone)]
pub struct ProcessController {
    table: Arc<dyn ProcessTable>,
    names: Vec<String>,
    timings: Timings,
}

impl ProcessController {
    /// Create a controller for the given process names.
    pub fn new(table: Arc<dyn ProcessTable>, names: Vec<String>, timings: Timings) -> Self {
        Self {
            table,
            names,
            timings,
        }
    }

    /// Process names this controller stops.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Terminate every running client process.
    ///
    /// Failures to enumerate or kill a single process are logged and skipped.
    /// When anything was terminated, blocks for the stop settle delay so the
    /// client's file locks are released. Returns the number of processes
    /// terminated.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;

        for name in &self.names {
            let entries = match self.table.find(name) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(process = %name, error = %e, "failed to enumerate processes");
                    continue;
                }
            };

            for entry in entries {
                match self.table.terminate(entry.pid) {
                    Ok(()) => {
                        tracing::debug!(process = %entry.name, pid = entry.pid, "terminated");
                        stopped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            process = %entry.name,
                            pid = entry.pid,
                            error = %e,
                            "failed to terminate process"
                        );
                    }
                }
            }
        }

        if stopped > 0 {
            tracing::info!(count = stopped, "stopped client processes");
            sleep(self.timings.stop_settle);
        }
        stopped
    }

    /// Launch the client executable.
    pub fn start(&self, exe: &Path) -> Result<()> {
        if !exe.is_file() {
            return Err(Error::ExecutableNotFound {
                path: exe.to_path_buf(),
            });
        }

        tracing::info!(exe = %exe.display(), "starting client");
        self.table.launch(exe)
    }

    /// Poll until a process named `name` is running.
    ///
    /// Returns `true` once the process is seen (after one extra settle wait)
    /// and `false` when every attempt came up empty. Lookup errors count as
    /// "not seen".
    pub fn wait_for_presence(&self, name: &str, attempts: u32, poll: Duration) -> bool {
        for attempt in 1..=attempts {
            match self.table.find(name) {
                Ok(found) if !found.is_empty() => {
                    tracing::debug!(process = %name, attempt, "process present");
                    sleep(self.timings.presence_settle);
                    return true;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(process = %name, error = %e, "presence check failed"),
            }

            if attempt < attempts {
                sleep(poll);
            }
        }

        tracing::debug!(process = %name, attempts, "process did not appear");
        false
    }

    /// Run [`wait_for_presence`](Self::wait_for_presence) for the main client
    /// process on a background thread with the configured limits.
    pub fn spawn_presence_watch(&self) -> JoinHandle<bool> {
        let controller = self.clone();
        let name = self
            .names
            .first()
            .cloned()
            .unwrap_or_else(|| "steam".to_string());

        std::thread::spawn(move || {
            let attempts = controller.timings.presence_attempts;
            let poll = controller.timings.presence_poll;
            controller.wait_for_presence(&name, attempts, poll)
        })
    }
}

pub(crate) fn sleep(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::platform::ProcessEntry;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory process table.
    #[derive(Default)]
    pub(crate) struct FakeProcessTable {
        pub running: Mutex<Vec<ProcessEntry>>,
        pub unkillable: Vec<u32>,
        pub launched: Mutex<Vec<PathBuf>>,
        pub terminated: Mutex<Vec<u32>>,
        /// Number of `find` calls before launched processes become visible.
        pub appear_after: Mutex<Option<u32>>,
    }

    impl FakeProcessTable {
        pub fn with(entries: &[(u32, &str)]) -> Self {
            let table = Self::default();
            *table.running.lock().unwrap() = entries
                .iter()
                .map(|(pid, name)| ProcessEntry {
                    pid: *pid,
                    name: name.to_string(),
                    exe: None,
                })
                .collect();
            table
        }

        pub fn terminated(&self) -> Vec<u32> {
            self.terminated.lock().unwrap().clone()
        }

        pub fn launched(&self) -> Vec<PathBuf> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn find(&self, name: &str) -> Result<Vec<ProcessEntry>> {
            {
                let mut appear = self.appear_after.lock().unwrap();
                if let Some(remaining) = appear.as_mut() {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Ok(Vec::new());
                    }
                }
            }
            Ok(self
                .running
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.name == name)
                .cloned()
                .collect())
        }

        fn terminate(&self, pid: u32) -> Result<()> {
            if self.unkillable.contains(&pid) {
                return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied").into());
            }
            self.running.lock().unwrap().retain(|p| p.pid != pid);
            self.terminated.lock().unwrap().push(pid);
            Ok(())
        }

        fn launch(&self, exe: &Path) -> Result<()> {
            self.launched.lock().unwrap().push(exe.to_path_buf());
            self.running.lock().unwrap().push(ProcessEntry {
                pid: 9999,
                name: "steam".to_string(),
                exe: Some(exe.to_path_buf()),
            });
            Ok(())
        }
    }

    fn names() -> Vec<String> {
        vec!["steam".to_string(), "steamwebhelper".to_string()]
    }

    #[test]
    fn test_stop_all_kills_every_match() {
        let table = Arc::new(FakeProcessTable::with(&[
            (1, "steam"),
            (2, "steamwebhelper"),
            (3, "steamwebhelper"),
            (4, "explorer"),
        ]));
        let controller = ProcessController::new(table.clone(), names(), Timings::immediate());

        assert_eq!(controller.stop_all(), 3);
        assert_eq!(table.terminated(), vec![1, 2, 3]);
        assert_eq!(table.running.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_all_skips_unkillable() {
        let mut table = FakeProcessTable::with(&[(1, "steam"), (2, "steamwebhelper")]);
        table.unkillable = vec![1];
        let table = Arc::new(table);
        let controller = ProcessController::new(table.clone(), names(), Timings::immediate());

        assert_eq!(controller.stop_all(), 1);
        assert_eq!(table.terminated(), vec![2]);
    }

    #[test]
    fn test_stop_all_nothing_running() {
        let table = Arc::new(FakeProcessTable::default());
        let controller = ProcessController::new(table, names(), Timings::immediate());
        assert_eq!(controller.stop_all(), 0);
    }

    #[test]
    fn test_start_missing_executable() {
        let table = Arc::new(FakeProcessTable::default());
        let controller = ProcessController::new(table.clone(), names(), Timings::immediate());

        let err = controller.start(Path::new("/nonexistent/steam.exe")).unwrap_err();
        assert!(matches!(err, Error::ExecutableNotFound { .. }));
        assert!(table.launched().is_empty());
    }

    #[test]
    fn test_start_launches_existing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("steam.exe");
        std::fs::write(&exe, b"").unwrap();

        let table = Arc::new(FakeProcessTable::default());
        let controller = ProcessController::new(table.clone(), names(), Timings::immediate());
        controller.start(&exe).unwrap();
        assert_eq!(table.launched(), vec![exe]);
    }

    #[test]
    fn test_wait_for_presence_eventually_seen() {
        let table = Arc::new(FakeProcessTable::with(&[(5, "steam")]));
        *table.appear_after.lock().unwrap() = Some(3);
        let controller = ProcessController::new(table, names(), Timings::immediate());

        assert!(controller.wait_for_presence("steam", 5, Duration::ZERO));
    }

    #[test]
    fn test_wait_for_presence_soft_timeout() {
        let table = Arc::new(FakeProcessTable::with(&[(5, "steam")]));
        *table.appear_after.lock().unwrap() = Some(10);
        let controller = ProcessController::new(table.clone(), names(), Timings::immediate());

        assert!(!controller.wait_for_presence("steam", 4, Duration::ZERO));
        // Exactly four polls were spent
        assert_eq!(*table.appear_after.lock().unwrap(), Some(6));
    }

    #[test]
    fn test_spawn_presence_watch() {
        let table = Arc::new(FakeProcessTable::with(&[(5, "steam")]));
        *table.appear_after.lock().unwrap() = Some(2);
        let controller = ProcessController::new(table, names(), Timings::immediate());

        let handle = controller.spawn_presence_watch();
        assert!(handle.join().unwrap());
    }
}
