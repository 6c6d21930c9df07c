//! Config command - show or change settings.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use quickfare_core::config::{Config, KeyPolicy};

use super::get_quickfare_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change settings (unset flags keep their current value)
    Set {
        /// Where the card key lives: ephemeral or file
        #[arg(long)]
        key_policy: Option<KeyPolicy>,
        /// Per-subscriber event queue length
        #[arg(long)]
        broadcast_capacity: Option<usize>,
        /// Lock wait limit in milliseconds
        #[arg(long)]
        lock_timeout_ms: Option<u64>,
        /// Token lifetime in minutes
        #[arg(long)]
        token_ttl_minutes: Option<i64>,
        /// Save the ledger between runs
        #[arg(long)]
        persist: Option<bool>,
        /// Card device file (relative paths are inside the data directory)
        #[arg(long)]
        card_device: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ConfigOutput {
    data_dir: String,
    key_policy: KeyPolicy,
    broadcast_capacity: usize,
    lock_timeout_ms: u128,
    token_ttl_minutes: i64,
    persist: bool,
    card_device: Option<String>,
}

impl ConfigOutput {
    fn new(data_dir: &std::path::Path, config: &Config) -> Self {
        Self {
            data_dir: data_dir.display().to_string(),
            key_policy: config.key_policy,
            broadcast_capacity: config.broadcast_capacity,
            lock_timeout_ms: config.lock_timeout.as_millis(),
            token_ttl_minutes: config.token_ttl.num_minutes(),
            persist: config.persist,
            card_device: config
                .card_device_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let dir = get_quickfare_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create quickfare directory: {}", dir.display()))?;
    let mut config = Config::load(&dir)?;

    match command {
        ConfigCommands::Show { json } => {
            let view = ConfigOutput::new(&dir, &config);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Setting", "Value"]);
            table.add_row(vec!["Data directory".to_string(), view.data_dir]);
            table.add_row(vec!["Key policy".to_string(), view.key_policy.as_str().to_string()]);
            table.add_row(vec![
                "Broadcast capacity".to_string(),
                view.broadcast_capacity.to_string(),
            ]);
            table.add_row(vec!["Lock timeout (ms)".to_string(), view.lock_timeout_ms.to_string()]);
            table.add_row(vec!["Token TTL (min)".to_string(), view.token_ttl_minutes.to_string()]);
            table.add_row(vec!["Persistence".to_string(), view.persist.to_string()]);
            table.add_row(vec![
                "Card device".to_string(),
                view.card_device.unwrap_or_else(|| "none".to_string()),
            ]);
            println!("{}", table);
        }
        ConfigCommands::Set {
            key_policy,
            broadcast_capacity,
            lock_timeout_ms,
            token_ttl_minutes,
            persist,
            card_device,
        } => {
            if let Some(policy) = key_policy {
                config.key_policy = policy;
            }
            if let Some(capacity) = broadcast_capacity {
                config.broadcast_capacity = capacity;
            }
            if let Some(ms) = lock_timeout_ms {
                config.lock_timeout = std::time::Duration::from_millis(ms);
            }
            if let Some(minutes) = token_ttl_minutes {
                config.token_ttl = chrono::Duration::minutes(minutes);
            }
            if let Some(persist) = persist {
                config.persist = persist;
            }
            if let Some(path) = card_device {
                config.card_device_path = Some(path);
            }

            config.validate()?;
            config.save(&dir)?;
            output::success("Settings saved");
        }
    }
    Ok(())
}
