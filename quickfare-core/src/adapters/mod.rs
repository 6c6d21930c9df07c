//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - HMAC-SHA256 bearer tokens for the Authenticator port
//! - A text file or process memory for the CardDevice port
//! - A JSON file for the SnapshotStore port

pub mod card_file;
pub mod card_memory;
pub mod json_snapshot;
pub mod token;

pub use card_file::FileCardDevice;
pub use card_memory::MemoryCardDevice;
pub use json_snapshot::JsonSnapshotStore;
pub use token::{HmacTokenAuthenticator, IssuedToken};
