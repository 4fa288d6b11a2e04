//! Client process and install commands.

use cachelogin::{AppConfig, Error, Result, SessionSwitcher};
use clap::Args;

/// Show the active account and install location
#[derive(Args, Debug)]
pub struct StatusCmd {}

impl StatusCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let switcher = SessionSwitcher::native(config);
        let store = switcher.store();

        match store.current_user()? {
            Some(user) => println!("Logged in as {}", user),
            None => println!("Not logged in."),
        }

        match store.resolve_install_path() {
            Ok(path) => println!("Install:       {}", path.display()),
            Err(e) => println!("Install:       unknown ({})", e),
        }
        if let Ok(cache) = store.machine_cache_path() {
            println!("Machine cache: {}", cache.display());
        }
        Ok(())
    }
}

/// Stop every client process
#[derive(Args, Debug)]
pub struct KillCmd {}

impl KillCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let switcher = SessionSwitcher::native(config);
        let stopped = switcher.processes().stop_all();
        println!("Stopped {} process(es)", stopped);
        Ok(())
    }
}

/// Start the client
#[derive(Args, Debug)]
pub struct StartCmd {
    /// Wait until the client process shows up.
    #[arg(long)]
    pub wait: bool,

    /// Start even when no account is active.
    #[arg(long)]
    pub force: bool,
}

impl StartCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let switcher = SessionSwitcher::native(config);
        let store = switcher.store();

        if !self.force && store.current_user()?.is_none() {
            return Err(Error::invalid_input(
                "no active account; switch first or pass --force",
            ));
        }

        let paths = store.resolve_paths()?;
        switcher.processes().start(&paths.executable)?;
        println!("Started {}", paths.executable.display());

        if self.wait {
            let watch = switcher.processes().spawn_presence_watch();
            let seen = watch.join().unwrap_or(false);
            if seen {
                println!("Client is running");
            } else {
                tracing::warn!("client did not appear before the wait expired");
                println!("Client did not appear yet");
            }
        }
        Ok(())
    }
}

/// Wipe the client's local login state and restart it
#[derive(Args, Debug)]
pub struct ResetCmd {
    /// Confirm the wipe.
    #[arg(long)]
    pub yes: bool,
}

impl ResetCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        if !self.yes {
            return Err(Error::invalid_input(
                "reset deletes userdata, config and the machine cache; pass --yes to confirm",
            ));
        }
        let switcher = SessionSwitcher::native(config);
        let paths = switcher.store().reset_client(switcher.processes())?;
        println!("Reset client at {}", paths.install_dir.display());
        Ok(())
    }
}

/// Copy the client's login documents into the backup directory
#[derive(Args, Debug)]
pub struct BackupCmd {}

impl BackupCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        let switcher = SessionSwitcher::native(config);
        let store = switcher.store();
        let paths = store.resolve_paths()?;
        let backup_dir = config.backup_dir()?;

        let copied = store.save_snapshot(&paths, &backup_dir)?;
        println!("Backed up {} document(s) to {}", copied, backup_dir.display());
        Ok(())
    }
}
