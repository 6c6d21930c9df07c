//! Reload and pay commands

use anyhow::Result;
use rust_decimal::Decimal;

use quickfare_core::domain::result::Result as CoreResult;
use quickfare_core::{LedgerReceipt, QuickfareContext, TransactionKind};

use super::{get_context, Principal};
use crate::output;

pub async fn run(kind: TransactionKind, amount: Decimal, who: Principal, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let result = apply(&ctx, kind, amount, &who).await;
    if result.is_ok() {
        ctx.persist().await?;
    }
    if json {
        return output::json(result);
    }

    let receipt = result?;
    let verb = match kind {
        TransactionKind::Reload => "Reloaded",
        TransactionKind::Payment => "Paid",
    };
    output::success(&format!(
        "{} {} ({})",
        verb,
        output::money(amount),
        receipt.handle
    ));
    println!("New balance: {}", output::money(receipt.new_balance));
    println!("Sequence: #{}", receipt.record.sequence_number);
    Ok(())
}

async fn apply(
    ctx: &QuickfareContext,
    kind: TransactionKind,
    amount: Decimal,
    who: &Principal,
) -> CoreResult<LedgerReceipt> {
    let handle = who.resolve(ctx)?;
    match kind {
        TransactionKind::Reload => ctx.ledger_service.reload(&handle, amount).await,
        TransactionKind::Payment => ctx.ledger_service.pay(&handle, amount).await,
    }
}
