//! Simulate command - concurrent load against an in-memory ledger
//!
//! Registers a few accounts, fires random reloads and payments at them from
//! parallel tasks while a watcher prints balance events, then checks that
//! every history folds to its balance.

use std::sync::Arc;

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use quickfare_core::config::Config;
use quickfare_core::{Error, QuickfareContext, TransactionKind};

use crate::output;

#[derive(Default, Serialize)]
struct SimulationReport {
    accounts: usize,
    committed: usize,
    rejected_insufficient: usize,
    events_seen: usize,
    balances: Vec<(String, Decimal)>,
    verified: bool,
}

pub async fn run(accounts: usize, operations: usize, watch: Option<String>, json: bool) -> Result<()> {
    if accounts == 0 {
        bail!("--accounts must be at least 1");
    }

    let ctx = Arc::new(QuickfareContext::in_memory(Config::default())?);
    let ledger = Arc::clone(&ctx.ledger_service);

    let handles: Vec<String> = (1..=accounts).map(|i| format!("rider-{}", i)).collect();
    for (i, handle) in handles.iter().enumerate() {
        ledger.register(handle, &format!("CARD-{:04}", i + 1)).await?;
        ledger.reload(handle, Decimal::from(20)).await?;
    }

    // Subscribe before the load starts so no event is missed
    let mut subscription = match &watch {
        Some(handle) => ledger.watch_balance(handle)?,
        None => ledger.watch_all(),
    };
    let print_events = watch.is_some() && !json;
    let watcher = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(event) = subscription.next_event().await {
            seen += 1;
            if print_events {
                println!(
                    "  {} #{:<5} {:>10}  balance {}",
                    event.account_handle.cyan(),
                    event.sequence_number,
                    output::signed(event.amount),
                    output::money(event.new_balance)
                );
            }
        }
        (seen, subscription.missed())
    });

    let progress = if json || print_events {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(operations as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} operations")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // Plan first: the thread-local rng must not live across an await
    let plan: Vec<(String, TransactionKind, Decimal)> = {
        let mut rng = rand::thread_rng();
        (0..operations)
            .map(|_| {
                let handle = handles[rng.gen_range(0..handles.len())].clone();
                let kind = if rng.gen_bool(0.5) {
                    TransactionKind::Reload
                } else {
                    TransactionKind::Payment
                };
                (handle, kind, Decimal::from(rng.gen_range(1..=15)))
            })
            .collect()
    };

    let mut tasks = Vec::with_capacity(plan.len());
    for (handle, kind, amount) in plan {
        let ledger = Arc::clone(&ledger);
        let progress = progress.clone();
        tasks.push(tokio::spawn(async move {
            let result = match kind {
                TransactionKind::Reload => ledger.reload(&handle, amount).await,
                TransactionKind::Payment => ledger.pay(&handle, amount).await,
            };
            progress.inc(1);
            result
        }));
    }

    let mut report = SimulationReport {
        accounts,
        ..Default::default()
    };
    for task in tasks {
        match task.await? {
            Ok(_) => report.committed += 1,
            Err(Error::InsufficientBalance { .. }) => report.rejected_insufficient += 1,
            Err(e) => return Err(e.into()),
        }
    }
    progress.finish_and_clear();

    report.verified = true;
    for handle in &handles {
        report
            .balances
            .push((handle.clone(), ledger.balance(handle).await?));
        if ledger.verify(handle).await.is_err() {
            report.verified = false;
        }
    }

    // Dropping the last ledger reference closes the channel and ends the watcher
    drop(ledger);
    drop(ctx);
    let (seen, missed) = watcher.await?;
    report.events_seen = seen;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        let mut table = output::create_table();
        table.set_header(vec!["Account", "Balance"]);
        for (handle, balance) in &report.balances {
            table.add_row(vec![handle.clone(), output::money(*balance)]);
        }
        println!("{}", table);
        println!(
            "Committed {} of {} operations ({} rejected for insufficient balance)",
            report.committed, operations, report.rejected_insufficient
        );
        println!("Watcher saw {} events", report.events_seen);
        if missed > 0 {
            output::warning(&format!("Watcher fell behind and skipped {} events", missed));
        }
        if report.verified {
            output::success("Every history folds to its balance");
        }
    }

    if !report.verified {
        bail!("Ledger verification failed");
    }
    Ok(())
}
