//! History command - list an account's transactions

use anyhow::Result;

use quickfare_core::domain::result::Result as CoreResult;
use quickfare_core::{QuickfareContext, TransactionRecord};

use super::{get_context, Principal};
use crate::output;

pub async fn run(who: Principal, limit: Option<usize>, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    let result = history(&ctx, &who, limit).await;
    if json {
        return output::json(result);
    }

    let records = result?;
    if records.is_empty() {
        output::info("No transactions");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["#", "Time", "Type", "Amount"]);
    for record in &records {
        table.add_row(vec![
            record.sequence_number.to_string(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.kind.as_str().to_string(),
            output::signed(record.amount),
        ]);
    }
    println!("{}", table);
    Ok(())
}

/// Most recent `limit` records, still in sequence order
async fn history(
    ctx: &QuickfareContext,
    who: &Principal,
    limit: Option<usize>,
) -> CoreResult<Vec<TransactionRecord>> {
    let handle = who.resolve(ctx)?;
    let mut records = ctx.ledger_service.history(&handle).await?;
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
    }
    Ok(records)
}
