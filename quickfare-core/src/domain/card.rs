//! Encrypted card reference

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ciphertext binding an account to a physical card identifier
///
/// Produced by the card identity binder with a fresh nonce on every call, so
/// two references to the same card never look alike. The type has no
/// equality on purpose: decrypt both sides and compare the plaintext instead.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedCardRef(String);

impl EncryptedCardRef {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded ciphertext (URL-safe base64)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptedCardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps logs readable without dumping the ciphertext
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "EncryptedCardRef({}…)", prefix)
    }
}
