//! QuickFare CLI - stored-value card ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{balance, card, config, history, login, register, simulate, status, transact, Principal};
use quickfare_core::TransactionKind;

/// QuickFare - stored-value card ledger
#[derive(Parser)]
#[command(name = "qf", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an account bound to a card
    Register {
        /// Account handle
        handle: String,
        /// Card identifier (read from the card device when omitted)
        #[arg(long)]
        card: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add funds to an account
    Reload {
        /// Amount to add
        amount: Decimal,
        #[command(flatten)]
        who: Principal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pay from an account
    Pay {
        /// Amount to pay
        amount: Decimal,
        #[command(flatten)]
        who: Principal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current balance
    Balance {
        #[command(flatten)]
        who: Principal,
        /// Show every account
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transaction history
    History {
        #[command(flatten)]
        who: Principal,
        /// Only the most recent N transactions
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Issue a bearer token for an account
    Login {
        /// Account handle
        handle: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the account a token belongs to
    Whoami {
        /// Bearer token
        #[arg(long, env = "QUICKFARE_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Card reader access
    Card {
        #[command(subcommand)]
        command: card::CardCommands,
    },

    /// Pay with the presented card
    Tap {
        /// Amount to pay
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ledger status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check every account's history against its balance
    Verify {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// Run concurrent random operations against a throwaway ledger
    Simulate {
        /// Number of accounts
        #[arg(long, default_value_t = 3)]
        accounts: usize,
        /// Number of operations
        #[arg(long, default_value_t = 200)]
        operations: usize,
        /// Print live balance events of one account
        #[arg(long)]
        watch: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<output::AlreadyReported>().is_none() {
                output::error(&format!("{:#}", e));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Register { handle, card, json } => register::run(&handle, card, json).await,
        Commands::Reload { amount, who, json } => {
            transact::run(TransactionKind::Reload, amount, who, json).await
        }
        Commands::Pay { amount, who, json } => {
            transact::run(TransactionKind::Payment, amount, who, json).await
        }
        Commands::Balance { who, all, json } => balance::run(who, all, json).await,
        Commands::History { who, limit, json } => history::run(who, limit, json).await,
        Commands::Login { handle, json } => login::run_login(&handle, json).await,
        Commands::Whoami { token, json } => login::run_whoami(token, json).await,
        Commands::Card { command } => card::run(command).await,
        Commands::Tap { amount, json } => card::run_tap(amount, json).await,
        Commands::Status { json } => status::run(json).await,
        Commands::Verify { json } => status::run_verify(json).await,
        Commands::Config { command } => config::run(command),
        Commands::Simulate {
            accounts,
            operations,
            watch,
            json,
        } => simulate::run(accounts, operations, watch, json).await,
    }
}
