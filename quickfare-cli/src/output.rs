//! Output formatting utilities

use std::fmt;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use quickfare_core::OperationResult;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format an amount with two decimal places
pub fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Signed amount, colored by direction
pub fn signed(amount: Decimal) -> String {
    if amount.is_sign_negative() {
        money(amount).red().to_string()
    } else {
        format!("+{}", money(amount)).green().to_string()
    }
}

/// The failure was already written to stdout as a JSON envelope
#[derive(Debug)]
pub struct AlreadyReported;

impl fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation failed")
    }
}

impl std::error::Error for AlreadyReported {}

/// Print a core result as an `OperationResult` envelope
///
/// A failed result is printed and then returned as `AlreadyReported` so the
/// process still exits non-zero.
pub fn json<T: Serialize>(result: quickfare_core::domain::result::Result<T>) -> anyhow::Result<()> {
    let failed = result.is_err();
    let envelope = OperationResult::from(result);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if failed {
        return Err(AlreadyReported.into());
    }
    Ok(())
}
