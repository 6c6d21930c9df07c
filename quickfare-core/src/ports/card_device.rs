//! Card reader/writer port
//!
//! Defines the interface to the physical card hardware. Calls may block for
//! as long as the device needs, so callers run them on the blocking pool and
//! never while holding an account lock.

use crate::domain::result::Result;

/// Card reader/writer capability
pub trait CardDevice: Send + Sync {
    /// Device name (e.g., "file", "memory")
    fn name(&self) -> &str;

    /// Read the text payload of the presented card
    ///
    /// Returns `Ok(None)` when no card is present or the card carries no
    /// readable payload. Device failures are `Error::Unavailable`.
    fn read_card(&self) -> Result<Option<String>>;

    /// Write a text payload to the presented card
    ///
    /// Returns `Ok(false)` when no writable card is present.
    fn write_card(&self, payload: &str) -> Result<bool>;
}
