//! CLI command implementations

pub mod balance;
pub mod card;
pub mod config;
pub mod history;
pub mod login;
pub mod register;
pub mod simulate;
pub mod status;
pub mod transact;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use quickfare_core::QuickfareContext;

/// Get the quickfare directory from environment or default
pub fn get_quickfare_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("QUICKFARE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".quickfare"))
        .context("Could not find home directory")
}

/// Open the ledger context for the data directory
pub async fn get_context() -> Result<QuickfareContext> {
    let dir = get_quickfare_dir()?;
    debug!(data_dir = %dir.display(), "Opening ledger");
    QuickfareContext::open(&dir)
        .await
        .with_context(|| format!("Failed to open ledger at {}", dir.display()))
}

/// Who a command acts for: an explicit handle or a bearer token
#[derive(Args, Debug, Clone)]
pub struct Principal {
    /// Account handle to act on
    #[arg(long, short = 'a')]
    pub account: Option<String>,
    /// Bearer token from `qf login` (takes effect when --account is absent)
    #[arg(long, env = "QUICKFARE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl Principal {
    /// Resolve to an account handle, verifying the token if one is used
    pub fn resolve(&self, ctx: &QuickfareContext) -> quickfare_core::domain::result::Result<String> {
        if let Some(account) = &self.account {
            return Ok(account.clone());
        }
        match &self.token {
            Some(token) => ctx.auth_service.authenticate(token),
            None => Err(quickfare_core::Error::authentication(
                "Pass --account or --token (or set QUICKFARE_TOKEN)",
            )),
        }
    }
}
