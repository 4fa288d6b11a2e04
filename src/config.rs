//! Global cachelogin configuration.
//!
//! Settings live in a TOML file under the user's config directory
//! (`~/.config/cachelogin/config.toml`, `%APPDATA%\cachelogin\config.toml`).
//! A missing file yields the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name for config and data directories.
pub const APP_NAME: &str = "cachelogin";

/// Config file name inside the config directory.
const CONFIG_FILENAME: &str = "config.toml";

/// Default account generation service.
pub const DEFAULT_GENERATOR_URL: &str = "https://api.nicealts.com";

/// Default community site for profile lookups.
pub const DEFAULT_COMMUNITY_URL: &str = "https://steamcommunity.com";

/// Global cachelogin configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Override for the application data root (database, backups).
    pub data_dir: Option<PathBuf>,

    /// Controlled client settings.
    pub client: ClientConfig,

    /// Blocking waits used while switching sessions.
    pub timings: Timings,

    /// Remote account generation settings.
    pub generator: GeneratorConfig,

    /// Community profile lookup settings.
    pub profile: ProfileConfig,
}

/// Where the client lives and which processes belong to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Skip install discovery and use this directory.
    pub install_path: Option<PathBuf>,

    /// Override for the machine-local cache document.
    pub machine_cache_path: Option<PathBuf>,

    /// Process names (without extension) stopped before a switch.
    pub process_names: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            install_path: None,
            machine_cache_path: None,
            process_names: ["steam", "steamwebhelper", "steamerrorreporter", "steamservice"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Settle delays and polling limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Wait after terminating at least one client process.
    #[serde(with = "humantime_serde")]
    pub stop_settle: Duration,

    /// Wait after the initial stop, before probing paths.
    #[serde(with = "humantime_serde")]
    pub post_stop_settle: Duration,

    /// Wait before the single retry of a failed stale-cache delete.
    #[serde(with = "humantime_serde")]
    pub purge_retry: Duration,

    /// Wait after re-stopping the client when a write was denied.
    #[serde(with = "humantime_serde")]
    pub write_retry: Duration,

    /// Interval between process presence checks.
    #[serde(with = "humantime_serde")]
    pub presence_poll: Duration,

    /// Maximum number of presence checks.
    pub presence_attempts: u32,

    /// Extra wait once the client has been seen.
    #[serde(with = "humantime_serde")]
    pub presence_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stop_settle: Duration::from_secs(2),
            post_stop_settle: Duration::from_secs(1),
            purge_retry: Duration::from_millis(500),
            write_retry: Duration::from_secs(1),
            presence_poll: Duration::from_millis(500),
            presence_attempts: 30,
            presence_settle: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// All waits disabled; presence is still polled the default number of times.
    pub fn immediate() -> Self {
        Self {
            stop_settle: Duration::ZERO,
            post_stop_settle: Duration::ZERO,
            purge_retry: Duration::ZERO,
            write_retry: Duration::ZERO,
            presence_poll: Duration::ZERO,
            presence_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Remote account generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Service base URL.
    pub base_url: String,

    /// API key sent with every request.
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATOR_URL.to_string(),
            api_key: None,
        }
    }
}

/// Community profile lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Community site base URL.
    pub base_url: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMMUNITY_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::ConfigLoad("could not determine config directory".into()))?;
        Ok(dir.join(APP_NAME).join(CONFIG_FILENAME))
    }

    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad(e.to_string()))?;
        toml::from_str(&text).map_err(|e| Error::ConfigLoad(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::ConfigSave(e.to_string()))?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::ConfigSave(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| Error::ConfigSave(e.to_string()))
    }

    /// Application data root.
    ///
    /// On Windows: `%LOCALAPPDATA%\cachelogin`
    /// On Linux: `~/.local/share/cachelogin`
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| Error::ConfigLoad("could not determine data directory".into()))?;
        Ok(base.join(APP_NAME))
    }

    /// Account database file.
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("database").join("accounts.redb"))
    }

    /// Single-slot snapshot directory.
    pub fn backup_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("backup"))
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.client.process_names.len(), 4);
        assert_eq!(config.client.process_names[0], "steam");
        assert_eq!(config.timings.stop_settle, Duration::from_secs(2));
        assert_eq!(config.timings.presence_attempts, 30);
        assert_eq!(config.generator.base_url, DEFAULT_GENERATOR_URL);
        assert_eq!(config.profile.base_url, DEFAULT_COMMUNITY_URL);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.client.install_path = Some(PathBuf::from("C:/Games/Steam"));
        config.timings.write_retry = Duration::from_millis(250);
        config.generator.api_key = Some("k-123".to_string());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        // Sections and fields missing from the file fall back to defaults
        let toml_text = r#"
            [timings]
            stop_settle = "3s"
            presence_attempts = 5
        "#;
        let config: AppConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.timings.stop_settle, Duration::from_secs(3));
        assert_eq!(config.timings.presence_attempts, 5);
        assert_eq!(config.timings.post_stop_settle, Duration::from_secs(1));
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timings]\nstop_settle = \"soon\"\n").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_data_dir_override() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/tmp/cl")),
            ..Default::default()
        };
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/cl/database/accounts.redb")
        );
        assert_eq!(config.backup_dir().unwrap(), PathBuf::from("/tmp/cl/backup"));
    }
}
