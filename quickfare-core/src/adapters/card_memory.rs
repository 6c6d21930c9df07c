//! In-memory card device for tests and simulations

use std::sync::{Mutex, PoisonError};

use crate::domain::result::Result;
use crate::ports::CardDevice;

#[derive(Default)]
pub struct MemoryCardDevice {
    card: Mutex<Option<String>>,
}

impl MemoryCardDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present a card carrying `payload`
    pub fn place_card(&self, payload: impl Into<String>) {
        *self.card.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.into());
    }

    /// Take the card away; returns its payload
    pub fn remove_card(&self) -> Option<String> {
        self.card.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl CardDevice for MemoryCardDevice {
    fn name(&self) -> &str {
        "memory"
    }

    fn read_card(&self) -> Result<Option<String>> {
        Ok(self
            .card
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|payload| !payload.is_empty()))
    }

    fn write_card(&self, payload: &str) -> Result<bool> {
        let mut card = self.card.lock().unwrap_or_else(PoisonError::into_inner);
        match card.as_mut() {
            Some(existing) => {
                *existing = payload.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
