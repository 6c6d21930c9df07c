//! Card commands - reader access and tap-to-pay

use anyhow::Result;
use clap::Subcommand;
use rust_decimal::Decimal;
use serde::Serialize;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum CardCommands {
    /// Read the presented card
    Read {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a payload to the presented card
    Write {
        /// Text payload (usually the card identifier)
        payload: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which account the presented card belongs to
    Identify {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ReadOutput {
    device: Option<String>,
    payload: Option<String>,
}

pub async fn run(command: CardCommands) -> Result<()> {
    let ctx = get_context().await?;
    let device = ctx.card_service.device_name().map(str::to_string);

    match command {
        CardCommands::Read { json } => {
            let result = ctx.card_service.read_card().await;
            if json {
                return output::json(result.map(|payload| ReadOutput { device, payload }));
            }
            match result? {
                Some(payload) => println!("{}", payload),
                None => output::warning("No card presented"),
            }
        }
        CardCommands::Write { payload, json } => {
            let result = ctx.card_service.write_card(&payload).await;
            if json {
                return output::json(result);
            }
            if result? {
                output::success("Card written");
            } else {
                output::warning("No writable card presented");
            }
        }
        CardCommands::Identify { json } => {
            let result = ctx.card_service.identify().await;
            if json {
                return output::json(result);
            }
            println!("{}", result?);
        }
    }
    Ok(())
}

/// Pay from whichever account the presented card is bound to
pub async fn run_tap(amount: Decimal, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let result = ctx.card_service.tap_to_pay(amount).await;
    if result.is_ok() {
        ctx.persist().await?;
    }
    if json {
        return output::json(result);
    }

    let receipt = result?;
    output::success(&format!(
        "Paid {} from {}",
        output::money(amount),
        receipt.handle
    ));
    println!("New balance: {}", output::money(receipt.new_balance));
    Ok(())
}
