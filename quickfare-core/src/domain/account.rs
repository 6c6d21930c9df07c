//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::card::EncryptedCardRef;

/// A stored-value account bound to one physical card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Human-facing identifier, unique and immutable
    pub handle: String,
    /// Encrypted physical card identifier, immutable
    pub encrypted_card_ref: EncryptedCardRef,
    /// Current balance, never negative after a committed operation
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(handle: impl Into<String>, encrypted_card_ref: EncryptedCardRef) -> Self {
        let now = Utc::now();
        Self {
            handle: handle.into(),
            encrypted_card_ref,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate a handle before registration
    pub fn validate_handle(handle: &str) -> Result<(), &'static str> {
        if handle.trim().is_empty() {
            return Err("account handle cannot be empty");
        }
        if handle.trim() != handle {
            return Err("account handle cannot start or end with whitespace");
        }
        if handle.chars().any(char::is_control) {
            return Err("account handle cannot contain control characters");
        }
        Ok(())
    }

    /// Validate a plaintext card identifier before binding
    pub fn validate_card_id(card_id: &str) -> Result<(), &'static str> {
        if card_id.trim().is_empty() {
            return Err("card id cannot be empty");
        }
        Ok(())
    }
}
