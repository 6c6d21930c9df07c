//! Card identity binder - reversible encryption of card identifiers
//!
//! Uses AES-256-GCM with a random 96-bit nonce per call. An encrypted
//! reference is `base64url(nonce || ciphertext || tag)`.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::Engine;
use rand::Rng;

use crate::domain::result::{Error, Result};
use crate::domain::{EncryptedCardRef, KEY_LEN};

/// GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
const TAG_LEN: usize = 16;

/// Associated data binding ciphertexts to this use
const CARD_AAD: &[u8] = b"quickfare-card-ref-v1";

/// Encrypts card identifiers with the context key
pub struct CardIdentityBinder {
    cipher: Aes256Gcm,
}

impl CardIdentityBinder {
    pub fn new(card_key: &[u8; KEY_LEN]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(card_key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt a plaintext card identifier
    ///
    /// Non-deterministic: binding the same card twice yields two different
    /// references.
    pub fn bind(&self, card_id: &str) -> Result<EncryptedCardRef> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: card_id.as_bytes(),
                    aad: CARD_AAD,
                },
            )
            .map_err(|e| Error::unavailable(format!("Card encryption failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(EncryptedCardRef::new(
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(sealed),
        ))
    }

    /// Decrypt a reference produced by `bind` with the same key
    ///
    /// Fails with `Error::Decryption` for malformed, corrupted or foreign
    /// references.
    pub fn unbind(&self, encrypted: &EncryptedCardRef) -> Result<String> {
        let sealed = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encrypted.as_str())
            .map_err(|e| Error::decryption(format!("Malformed card reference: {}", e)))?;

        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::decryption("Card reference is truncated"));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: CARD_AAD,
                },
            )
            .map_err(|_| Error::decryption("Card reference failed authentication"))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::decryption("Card reference is not valid UTF-8"))
    }

    /// Whether a reference decrypts to the given plaintext card identifier
    pub fn matches(&self, encrypted: &EncryptedCardRef, card_id: &str) -> Result<bool> {
        Ok(self.unbind(encrypted)? == card_id)
    }
}

impl fmt::Debug for CardIdentityBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardIdentityBinder { .. }")
    }
}
