//! Key material domain models

use std::fmt;

use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Length of the AES-256 card key and the token secret
pub const KEY_LEN: usize = 32;

/// Keyring format version written to keyring.json
pub const KEYRING_VERSION: u32 = 1;

/// Symmetric key material held for the lifetime of a ledger context
///
/// `card_key` encrypts card identifiers, `token_secret` signs bearer tokens.
#[derive(Clone)]
pub struct Keyring {
    pub card_key: [u8; KEY_LEN],
    pub token_secret: [u8; KEY_LEN],
}

impl Keyring {
    /// Generate fresh random key material
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            card_key: rng.gen(),
            token_secret: rng.gen(),
        }
    }

    /// Serialize to the on-disk representation
    pub fn to_file(&self) -> KeyringFile {
        let b64 = base64::engine::general_purpose::STANDARD;
        KeyringFile {
            version: KEYRING_VERSION,
            algorithm: "aes-256-gcm".to_string(),
            card_key: b64.encode(self.card_key),
            token_secret: b64.encode(self.token_secret),
        }
    }

    /// Parse the on-disk representation
    pub fn from_file(file: &KeyringFile) -> Result<Self> {
        if file.version != KEYRING_VERSION {
            return Err(Error::Config(format!(
                "Unsupported keyring version {}",
                file.version
            )));
        }
        Ok(Self {
            card_key: decode_key(&file.card_key, "card_key")?,
            token_secret: decode_key(&file.token_secret, "token_secret")?,
        })
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Keyring { .. }")
    }
}

fn decode_key(encoded: &str, field: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::Config(format!("Invalid {} in keyring: {}", field, e)))?;
    bytes
        .try_into()
        .map_err(|_| Error::Config(format!("{} must be {} bytes", field, KEY_LEN)))
}

/// Keyring stored in keyring.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringFile {
    pub version: u32,
    pub algorithm: String,
    /// Base64-encoded AES-256 key
    pub card_key: String,
    /// Base64-encoded HMAC secret
    pub token_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyring_file_round_trip() {
        let keyring = Keyring::generate();
        let file = keyring.to_file();
        assert_eq!(file.version, KEYRING_VERSION);

        let parsed = Keyring::from_file(&file).unwrap();
        assert_eq!(parsed.card_key, keyring.card_key);
        assert_eq!(parsed.token_secret, keyring.token_secret);
    }

    #[test]
    fn test_keyring_rejects_short_key() {
        let mut file = Keyring::generate().to_file();
        file.card_key = base64::engine::general_purpose::STANDARD.encode([0u8; 8]);
        assert!(matches!(Keyring::from_file(&file), Err(Error::Config(_))));
    }

    #[test]
    fn test_keyring_debug_hides_material() {
        let keyring = Keyring::generate();
        assert_eq!(format!("{:?}", keyring), "Keyring { .. }");
    }
}
