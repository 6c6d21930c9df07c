//! Status and verify commands

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use quickfare_core::config::KeyPolicy;
use quickfare_core::services::{EncryptionStatus, LedgerSummary};

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct StatusOutput {
    data_dir: Option<String>,
    ledger: LedgerSummary,
    key_policy: KeyPolicy,
    encryption: Option<EncryptionStatus>,
    persistence: bool,
    card_device: Option<String>,
}

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let encryption = match &ctx.encryption_service {
        Some(service) => Some(service.get_status(ctx.config.key_policy)?),
        None => None,
    };
    let status = StatusOutput {
        data_dir: ctx.data_dir.as_ref().map(|d| d.display().to_string()),
        ledger: ctx.ledger_service.summary(),
        key_policy: ctx.config.key_policy,
        encryption,
        persistence: ctx.persistence_service.is_enabled(),
        card_device: ctx
            .config
            .card_device_path
            .as_ref()
            .map(|p| p.display().to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Accounts".to_string(), status.ledger.total_accounts.to_string()]);
    table.add_row(vec![
        "Transactions".to_string(),
        status.ledger.total_transactions.to_string(),
    ]);
    table.add_row(vec![
        "Last sequence".to_string(),
        status.ledger.last_sequence.to_string(),
    ]);
    table.add_row(vec![
        "Key policy".to_string(),
        status.key_policy.as_str().to_string(),
    ]);
    table.add_row(vec![
        "Persistence".to_string(),
        if status.persistence { "on" } else { "off" }.to_string(),
    ]);
    table.add_row(vec![
        "Card device".to_string(),
        status.card_device.clone().unwrap_or_else(|| "none".to_string()),
    ]);
    println!("{}", table);

    if let Some(dir) = &status.data_dir {
        println!();
        println!("Data directory: {}", dir);
    }
    if status.key_policy == KeyPolicy::Ephemeral && status.ledger.total_accounts > 0 {
        output::warning("Ephemeral keys: card bindings will not survive this process");
    }
    Ok(())
}

#[derive(Serialize)]
struct VerifyEntry {
    handle: String,
    ok: bool,
    error: Option<String>,
}

/// Check that every account's history folds to its balance
pub async fn run_verify(json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let mut entries = Vec::new();
    for account in ctx.ledger_service.accounts().await? {
        let error = ctx
            .ledger_service
            .verify(&account.handle)
            .await
            .err()
            .map(|e| e.to_string());
        entries.push(VerifyEntry {
            handle: account.handle,
            ok: error.is_none(),
            error,
        });
    }
    let failed = entries.iter().filter(|e| !e.ok).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        output::info("No accounts registered");
    } else {
        for entry in &entries {
            match &entry.error {
                None => println!("{} {}", "ok".green(), entry.handle),
                Some(err) => output::error(&format!("FAIL {}: {}", entry.handle, err)),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} account(s) failed verification", failed);
    }
    Ok(())
}
