//! Encryption service - key material management
//!
//! Owns `keyring.json` in the data directory: the AES-256-GCM card key and
//! the token signing secret. Losing the file makes every stored card
//! reference unreadable.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::config::KeyPolicy;
use crate::domain::result::Result;
use crate::domain::{Keyring, KeyringFile};

/// Encryption service for the card key and token secret
pub struct EncryptionService {
    data_dir: PathBuf,
}

impl EncryptionService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn keyring_file(&self) -> PathBuf {
        self.data_dir.join("keyring.json")
    }

    /// Key material for a policy
    ///
    /// `Ephemeral` always generates fresh keys and touches no file. `File`
    /// loads keyring.json, creating it on first use.
    pub fn keyring_for(&self, policy: KeyPolicy) -> Result<Keyring> {
        match policy {
            KeyPolicy::Ephemeral => Ok(Keyring::generate()),
            KeyPolicy::File => self.load_or_create(),
        }
    }

    /// Load keyring.json, creating it with fresh keys if missing
    pub fn load_or_create(&self) -> Result<Keyring> {
        if let Some(keyring) = self.load()? {
            return Ok(keyring);
        }

        let keyring = Keyring::generate();
        self.write(&keyring)?;
        info!(path = %self.keyring_file().display(), "Created keyring");
        Ok(keyring)
    }

    /// Load keyring.json if present
    pub fn load(&self) -> Result<Option<Keyring>> {
        let path = self.keyring_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let file: KeyringFile = serde_json::from_str(&content)?;
        Ok(Some(Keyring::from_file(&file)?))
    }

    /// Get keyring status
    pub fn get_status(&self, policy: KeyPolicy) -> Result<EncryptionStatus> {
        let path = self.keyring_file();
        let algorithm = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: KeyringFile = serde_json::from_str(&content)?;
            Some(file.algorithm)
        } else {
            None
        };

        Ok(EncryptionStatus {
            key_policy: policy,
            keyring_present: algorithm.is_some(),
            algorithm,
        })
    }

    fn write(&self, keyring: &Keyring) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.keyring_file();
        let content = serde_json::to_string_pretty(&keyring.to_file())?;
        fs::write(&path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Key material status for display
#[derive(Debug, Clone, Serialize)]
pub struct EncryptionStatus {
    pub key_policy: KeyPolicy,
    pub keyring_present: bool,
    pub algorithm: Option<String>,
}
