//! Register command - open an account bound to a card

use anyhow::Result;

use quickfare_core::domain::result::Result as CoreResult;
use quickfare_core::{Account, QuickfareContext};

use super::get_context;
use crate::output;

pub async fn run(handle: &str, card: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let result = register(&ctx, handle, card).await;
    if result.is_ok() {
        ctx.persist().await?;
    }
    if json {
        return output::json(result);
    }

    let account = result?;
    output::success(&format!("Registered account {}", account.handle));
    println!("Balance: {}", output::money(account.balance));
    Ok(())
}

async fn register(ctx: &QuickfareContext, handle: &str, card: Option<String>) -> CoreResult<Account> {
    // Without --card the identifier comes from the presented card
    let card_id = match card {
        Some(card) => card,
        None => ctx.card_service.read_card().await?.ok_or_else(|| {
            quickfare_core::Error::unavailable("No card presented; pass --card or place a card")
        })?,
    };
    ctx.ledger_service.register(handle, &card_id).await
}
