//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "ledger": { "broadcastCapacity": 64, "lockTimeoutMs": 5000, "persist": true },
//!   "auth": { "tokenTtlMinutes": 15 },
//!   "card": { "keyPolicy": "file", "devicePath": "card.txt" }
//! }
//! ```
//! Keys the core does not manage are preserved on save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Where the card encryption key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    /// Fresh random key per process; encrypted references die with it
    Ephemeral,
    /// Key kept in keyring.json in the data directory
    File,
}

impl KeyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPolicy::Ephemeral => "ephemeral",
            KeyPolicy::File => "file",
        }
    }
}

impl FromStr for KeyPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ephemeral" => Ok(KeyPolicy::Ephemeral),
            "file" => Ok(KeyPolicy::File),
            other => Err(format!("expected 'ephemeral' or 'file', got '{}'", other)),
        }
    }
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(default)]
    auth: AuthSettings,
    #[serde(default)]
    card: CardSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LedgerSettings {
    broadcast_capacity: usize,
    lock_timeout_ms: u64,
    persist: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AuthSettings {
    token_ttl_minutes: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CardSettings {
    key_policy: KeyPolicy,
    device_path: Option<String>,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            key_policy: KeyPolicy::File,
            device_path: None,
        }
    }
}

pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 15;
/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Ledger configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-subscriber event queue length
    pub broadcast_capacity: usize,
    /// Upper bound on waiting for an account lock
    pub lock_timeout: Duration,
    /// Lifetime of issued bearer tokens
    pub token_ttl: chrono::Duration,
    pub key_policy: KeyPolicy,
    /// Save and restore the ledger through the snapshot store
    pub persist: bool,
    /// File used by the file card device, if any
    pub card_device_path: Option<PathBuf>,
    // Keep the raw settings for preservation when saving
    pub _raw_settings: SettingsFile,
}

impl Default for Config {
    /// In-memory defaults: ephemeral key, no persistence, no card device
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            token_ttl: chrono::Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            key_policy: KeyPolicy::Ephemeral,
            persist: false,
            card_device_path: None,
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from a data directory
    ///
    /// A missing or malformed settings.json yields the data-directory
    /// defaults (file key policy, persistence on). Environment overrides:
    /// - `QUICKFARE_KEY_POLICY` (`ephemeral` | `file`)
    /// - `QUICKFARE_BROADCAST_CAPACITY`
    /// - `QUICKFARE_CARD_DEVICE` (path of the file card device)
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let key_policy = match std::env::var("QUICKFARE_KEY_POLICY").ok() {
            Some(value) => value
                .parse()
                .map_err(|e| Error::Config(format!("QUICKFARE_KEY_POLICY: {}", e)))?,
            None => raw.card.key_policy,
        };

        let broadcast_capacity = match std::env::var("QUICKFARE_BROADCAST_CAPACITY").ok() {
            Some(value) => value.trim().parse().map_err(|_| {
                Error::Config(format!("Invalid QUICKFARE_BROADCAST_CAPACITY value: {}", value))
            })?,
            None => raw.ledger.broadcast_capacity,
        };

        let device_path = std::env::var("QUICKFARE_CARD_DEVICE")
            .ok()
            .or_else(|| raw.card.device_path.clone())
            .map(|p| {
                let path = PathBuf::from(p);
                if path.is_relative() {
                    data_dir.join(path)
                } else {
                    path
                }
            });

        let token_ttl = chrono::Duration::try_minutes(raw.auth.token_ttl_minutes).ok_or_else(|| {
            Error::Config(format!(
                "tokenTtlMinutes out of range: {}",
                raw.auth.token_ttl_minutes
            ))
        })?;

        let config = Self {
            broadcast_capacity,
            lock_timeout: Duration::from_millis(raw.ledger.lock_timeout_ms),
            token_ttl,
            key_policy,
            persist: raw.ledger.persist,
            card_device_path: device_path,
            _raw_settings: raw,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to a data directory
    /// Preserves other settings that the core doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.ledger.broadcast_capacity = self.broadcast_capacity;
        settings.ledger.lock_timeout_ms = self.lock_timeout.as_millis() as u64;
        settings.ledger.persist = self.persist;
        settings.auth.token_ttl_minutes = self.token_ttl.num_minutes();
        settings.card.key_policy = self.key_policy;
        settings.card.device_path = self
            .card_device_path
            .as_ref()
            .map(|p| p.display().to_string());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.broadcast_capacity == 0 {
            return Err(Error::Config("broadcastCapacity must be at least 1".to_string()));
        }
        if self.lock_timeout.is_zero() {
            return Err(Error::Config("lockTimeoutMs must be at least 1".to_string()));
        }
        if self.token_ttl <= chrono::Duration::zero() {
            return Err(Error::Config("tokenTtlMinutes must be positive".to_string()));
        }
        if self.token_ttl > chrono::Duration::minutes(MAX_TOKEN_TTL_MINUTES) {
            return Err(Error::Config(format!(
                "tokenTtlMinutes must be at most {}",
                MAX_TOKEN_TTL_MINUTES
            )));
        }
        if self.persist && self.key_policy == KeyPolicy::Ephemeral {
            // Snapshots hold encrypted references that only the saving key can open
            return Err(Error::Config(
                "persistence requires the file key policy".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_in_memory() {
        let config = Config::default();
        assert_eq!(config.key_policy, KeyPolicy::Ephemeral);
        assert!(!config.persist);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_settings_uses_data_dir_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.key_policy, KeyPolicy::File);
        assert!(config.persist);
        assert_eq!(config.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
        assert_eq!(config.token_ttl, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_load_reads_settings_and_resolves_device_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger":{"broadcastCapacity":8,"lockTimeoutMs":250},"card":{"devicePath":"tag.txt"}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.broadcast_capacity, 8);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.card_device_path, Some(dir.path().join("tag.txt")));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ui":{"theme":"dark"},"ledger":{"broadcastCapacity":8}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.broadcast_capacity = 16;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["ui"]["theme"], "dark");
        assert_eq!(saved["ledger"]["broadcastCapacity"], 16);
    }

    #[test]
    fn test_oversized_token_ttl_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let settings = dir.path().join("settings.json");

        // Beyond what a duration can hold
        std::fs::write(&settings, r#"{"auth":{"tokenTtlMinutes":9223372036854775807}}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        // Representable, but longer than any token should live
        std::fs::write(&settings, r#"{"auth":{"tokenTtlMinutes":10000000000000}}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        let at_cap = format!(r#"{{"auth":{{"tokenTtlMinutes":{}}}}}"#, MAX_TOKEN_TTL_MINUTES);
        std::fs::write(&settings, at_cap).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.token_ttl, chrono::Duration::minutes(MAX_TOKEN_TTL_MINUTES));
    }

    #[test]
    fn test_persistence_needs_file_keys() {
        let config = Config {
            persist: true,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
