//! File-backed card device
//!
//! Stands in for an NFC reader: the card is "presented" while the file
//! exists, and its trimmed text content is the card payload.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::ports::CardDevice;

pub struct FileCardDevice {
    path: PathBuf,
}

impl FileCardDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CardDevice for FileCardDevice {
    fn name(&self) -> &str {
        "file"
    }

    fn read_card(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let payload = content.trim();
                if payload.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(payload.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::unavailable(format!(
                "Card device {} failed: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_card(&self, payload: &str) -> Result<bool> {
        // Only a presented card can be written
        if !self.path.exists() {
            return Ok(false);
        }
        fs::write(&self.path, payload).map_err(|e| {
            Error::unavailable(format!("Card device {} failed: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), "Wrote card payload");
        Ok(true)
    }
}
