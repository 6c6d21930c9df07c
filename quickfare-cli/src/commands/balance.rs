//! Balance command - show one account or every account

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use quickfare_core::domain::result::Result as CoreResult;
use quickfare_core::QuickfareContext;

use super::{get_context, Principal};
use crate::output;

#[derive(Serialize)]
struct BalanceOutput {
    handle: String,
    balance: rust_decimal::Decimal,
}

pub async fn run(who: Principal, all: bool, json: bool) -> Result<()> {
    let ctx = get_context().await?;

    if all {
        let result = all_balances(&ctx).await;
        if json {
            return output::json(result);
        }
        let balances = result?;
        if balances.is_empty() {
            output::info("No accounts registered");
            return Ok(());
        }

        let mut table = output::create_table();
        table.set_header(vec!["Account", "Balance"]);
        for entry in &balances {
            table.add_row(vec![entry.handle.clone(), output::money(entry.balance)]);
        }
        println!("{}", table);
        return Ok(());
    }

    let result = one_balance(&ctx, &who).await;
    if json {
        return output::json(result);
    }
    let entry = result?;
    println!("{}: {}", entry.handle.bold(), output::money(entry.balance));
    Ok(())
}

async fn one_balance(ctx: &QuickfareContext, who: &Principal) -> CoreResult<BalanceOutput> {
    let handle = who.resolve(ctx)?;
    let balance = ctx.ledger_service.balance(&handle).await?;
    Ok(BalanceOutput { handle, balance })
}

async fn all_balances(ctx: &QuickfareContext) -> CoreResult<Vec<BalanceOutput>> {
    Ok(ctx
        .ledger_service
        .accounts()
        .await?
        .into_iter()
        .map(|account| BalanceOutput {
            handle: account.handle,
            balance: account.balance,
        })
        .collect())
}
