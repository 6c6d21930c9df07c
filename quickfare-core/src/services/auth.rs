//! Auth service - session tokens for account holders

use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::{HmacTokenAuthenticator, IssuedToken};
use crate::domain::result::Result;
use crate::ports::Authenticator;
use crate::services::ledger::LedgerService;

/// Issues tokens for registered accounts and resolves credentials to handles
pub struct AuthService {
    issuer: Arc<HmacTokenAuthenticator>,
    authenticator: Arc<dyn Authenticator>,
    ledger: Arc<LedgerService>,
}

impl AuthService {
    pub fn new(issuer: Arc<HmacTokenAuthenticator>, ledger: Arc<LedgerService>) -> Self {
        Self {
            authenticator: Arc::clone(&issuer) as Arc<dyn Authenticator>,
            issuer,
            ledger,
        }
    }

    /// Verify credentials with a different oracle than the bundled tokens
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Issue a token for a registered account
    pub async fn login(&self, handle: &str) -> Result<IssuedToken> {
        // Unknown handles fail with AccountNotFound before anything is signed
        self.ledger.account(handle).await?;
        let token = self.issuer.issue(handle)?;
        info!(handle, expires_at = %token.expires_at, "Issued token");
        Ok(token)
    }

    /// Resolve a credential to the account handle it was issued for
    pub fn authenticate(&self, credential: &str) -> Result<String> {
        let handle = self.authenticator.authenticate(credential)?;
        debug!(handle = %handle, "Authenticated credential");
        Ok(handle)
    }
}
