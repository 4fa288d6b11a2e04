//! Configuration CLI commands.

use cachelogin::{AppConfig, Error, Result};
use clap::{Args, Subcommand};

/// Configuration commands
#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Show current configuration
    Show(ShowCmd),

    /// Print the config file path
    Path(PathCmd),

    /// Store the account generation API key
    SetApiKey(SetApiKeyCmd),
}

impl ConfigCmd {
    pub fn run(self, config: AppConfig) -> Result<()> {
        match self {
            ConfigCmd::Show(cmd) => cmd.run(&config),
            ConfigCmd::Path(cmd) => cmd.run(),
            ConfigCmd::SetApiKey(cmd) => cmd.run(config),
        }
    }
}

// ============================================================================
// Show Command
// ============================================================================

/// Show current configuration
#[derive(Args, Debug)]
pub struct ShowCmd {}

impl ShowCmd {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        if let Ok(path) = AppConfig::config_path() {
            let status = if path.exists() { "" } else { " (not created, using defaults)" };
            println!("Config file: {}{}", path.display(), status);
        }
        println!();

        println!("Client:");
        match &config.client.install_path {
            Some(path) => println!("  Install path: {}", path.display()),
            None => println!("  Install path: auto-detect"),
        }
        match &config.client.machine_cache_path {
            Some(path) => println!("  Machine cache: {}", path.display()),
            None => println!("  Machine cache: default"),
        }
        println!("  Processes: {}", config.client.process_names.join(", "));
        println!();

        let t = &config.timings;
        println!("Timings:");
        println!("  Stop settle: {}", humantime::format_duration(t.stop_settle));
        println!("  Post-stop settle: {}", humantime::format_duration(t.post_stop_settle));
        println!("  Purge retry: {}", humantime::format_duration(t.purge_retry));
        println!("  Write retry: {}", humantime::format_duration(t.write_retry));
        println!(
            "  Presence: {} x {}, then {}",
            t.presence_attempts,
            humantime::format_duration(t.presence_poll),
            humantime::format_duration(t.presence_settle)
        );
        println!();

        println!("Generator:");
        println!("  Base URL: {}", config.generator.base_url);
        let key = match config.generator.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => mask(key),
            _ => "not set".to_string(),
        };
        println!("  API key: {}", key);
        println!();

        println!("Profiles:");
        println!("  Base URL: {}", config.profile.base_url);

        if let Ok(dir) = config.data_dir() {
            println!();
            println!("Data directory: {}", dir.display());
        }
        Ok(())
    }
}

/// Keep only the last four characters of a secret visible.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

// ============================================================================
// Path / SetApiKey Commands
// ============================================================================

/// Print the config file path
#[derive(Args, Debug)]
pub struct PathCmd {}

impl PathCmd {
    pub fn run(self) -> Result<()> {
        println!("{}", AppConfig::config_path()?.display());
        Ok(())
    }
}

/// Store the account generation API key
#[derive(Args, Debug)]
pub struct SetApiKeyCmd {
    /// API key; an empty string clears it.
    pub key: String,
}

impl SetApiKeyCmd {
    pub fn run(self, mut config: AppConfig) -> Result<()> {
        let key = self.key.trim();
        if key.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input("API key must not contain whitespace"));
        }

        config.generator.api_key = (!key.is_empty()).then(|| key.to_string());
        config.save()?;

        if key.is_empty() {
            println!("API key cleared");
        } else {
            println!("API key saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask("sk-1234567890"), "****7890");
        assert_eq!(mask("  abcdef  "), "****cdef");
    }
}
