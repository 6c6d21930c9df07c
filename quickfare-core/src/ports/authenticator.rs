//! Authentication port

use crate::domain::result::Result;

/// Authentication oracle
///
/// Turns a caller credential (a bearer token for the bundled adapter) into a
/// stable account handle. Failures surface as `Error::Authentication`
/// unchanged; the ledger never interprets them.
pub trait Authenticator: Send + Sync {
    /// Resolve a credential to an account handle
    fn authenticate(&self, credential: &str) -> Result<String>;
}
