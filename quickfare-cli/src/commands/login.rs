//! Login and whoami commands - bearer token handling

use anyhow::{Context, Result};

use quickfare_core::domain::result::Result as CoreResult;

use super::get_context;
use crate::output;

pub async fn run_login(handle: &str, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let result = ctx.auth_service.login(handle).await;
    if json {
        return output::json(result);
    }

    let token = result?;
    output::success(&format!("Logged in as {}", handle));
    println!(
        "Token expires at {}",
        token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    println!("export QUICKFARE_TOKEN={}", token.access_token);
    Ok(())
}

pub async fn run_whoami(token: Option<String>, json: bool) -> Result<()> {
    let token = token.context("Pass --token or set QUICKFARE_TOKEN")?;
    let ctx = get_context().await?;

    let result: CoreResult<String> = ctx.auth_service.authenticate(&token);
    if json {
        return output::json(result);
    }
    println!("{}", result?);
    Ok(())
}
