//! Referral CLI
//!
//! Argument definitions and the top-level runner: load configuration,
//! initialize logging, open the sled store and dispatch to a command.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use lib_referral::ReferralEngine;
use lib_storage::{SledBackend, StorageBackend};

use crate::cli_config::{self, RuntimeSettings, REFERRAL_TREE};
use crate::commands;
use crate::logic;
use crate::error::CliResult;
use crate::output::{ConsoleOutput, Output};

/// Multi-level referral engine operator CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "referral")]
pub struct ReferralCli {
    /// Configuration file path (default: ~/.referral/referral.toml)
    #[arg(short, long, env = "REFERRAL_CONFIG")]
    pub config: Option<String>,

    /// Data directory for the sled store (overrides config)
    #[arg(short, long, env = "REFERRAL_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Log level (overrides config; RUST_LOG wins over both)
    #[arg(short, long, env = "REFERRAL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", env = "REFERRAL_FORMAT")]
    pub format: String,

    #[command(subcommand)]
    pub command: ReferralCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReferralCommand {
    /// Account enrollment, lookup and status
    Account(AccountArgs),

    /// Commission distribution and audit records
    Commission(CommissionArgs),

    /// Deposits, withdrawals and admin adjustments
    Wallet(WalletArgs),
}

// ============================================================================
// Account
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub action: AccountAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountAction {
    /// Enroll a new account
    Enroll {
        /// Full name
        #[arg(short, long)]
        name: String,
        /// Email address (unique)
        #[arg(short, long)]
        email: String,
        /// Sponsor's referral code
        #[arg(short, long)]
        sponsor: Option<String>,
    },
    /// Show an account by id or referral code
    Show {
        /// Account id (hex)
        #[arg(required_unless_present = "code")]
        account: Option<String>,
        /// Look up by referral code instead
        #[arg(long, conflicts_with = "account")]
        code: Option<String>,
    },
    /// Downline counts per level
    Downline {
        /// Account id (hex)
        account: String,
        /// Also list direct referrals
        #[arg(long)]
        list: bool,
    },
    /// Re-derive the direct referral counter from the downline index
    Reconcile {
        /// Account id (hex)
        account: String,
    },
    /// Suspend an account (blocks withdrawals)
    Suspend {
        /// Account id (hex)
        account: String,
    },
    /// Reactivate a suspended account
    Reactivate {
        /// Account id (hex)
        account: String,
    },
}

// ============================================================================
// Commission
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct CommissionArgs {
    #[command(subcommand)]
    pub action: CommissionAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CommissionAction {
    /// Distribute commission for a qualifying amount
    Distribute {
        /// Beneficiary account id (hex)
        account: String,
        /// Gross amount, e.g. 100 or 12.50
        amount: String,
        /// Idempotency key of the qualifying event (generated if omitted)
        #[arg(short, long)]
        event: Option<String>,
    },
    /// Confirm a qualifying payment: deposit then distribute under one key
    Pay {
        /// Paying account id (hex)
        account: String,
        /// Payment amount
        amount: String,
        /// Payment confirmation id
        #[arg(short, long)]
        event: String,
    },
    /// Show the recorded distribution for an event
    Record {
        /// Event key
        event: String,
    },
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct WalletArgs {
    #[command(subcommand)]
    pub action: WalletAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum WalletAction {
    /// Credit a deposit to the account balance
    Deposit {
        /// Account id (hex)
        account: String,
        /// Deposit amount
        amount: String,
        /// Deposit confirmation id (generated if omitted)
        #[arg(short, long)]
        event: Option<String>,
    },
    /// Withdraw referral earnings
    Withdraw {
        /// Account id (hex)
        account: String,
        /// Amount to withdraw
        amount: String,
        /// Withdrawal request id (generated if omitted)
        #[arg(short, long)]
        request: Option<String>,
    },
    /// Manually adjust balance or referral earnings
    Adjust {
        /// Account id (hex)
        account: String,
        /// balance | earnings
        #[arg(short, long)]
        target: String,
        /// Signed amount, e.g. -12.50
        #[arg(short, long, allow_hyphen_values = true)]
        delta: String,
        /// Reason recorded in the audit log
        #[arg(short, long)]
        reason: String,
    },
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

pub async fn run_cli() -> Result<()> {
    let cli = ReferralCli::parse();
    logic::validate_output_format(&cli.format)?;

    let config = cli_config::load_config(cli.config.as_deref())?;
    let settings = cli_config::resolve_settings(config, cli.data_dir.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level);

    run_with_settings(cli, settings).await
}

/// Open the store named by `settings` and run one command against it
pub async fn run_with_settings(cli: ReferralCli, settings: RuntimeSettings) -> Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    debug!("Opening referral store at {}", settings.data_dir.display());

    let backend = SledBackend::open(&settings.data_dir)?;
    let tree = backend.open_tree(REFERRAL_TREE)?;
    let (engine, notifications) = ReferralEngine::with_tracing_notifications(tree, settings.referral)?;

    let result = run_command(&engine, cli.command, &cli.format, &ConsoleOutput).await;

    engine.store().backend().flush().await?;
    drop(engine);
    // Deliver whatever notifications the command queued
    notifications.await?;

    result.map_err(Into::into)
}

/// Dispatch one command to its handler
pub async fn run_command<B: StorageBackend>(
    engine: &ReferralEngine<B>,
    command: ReferralCommand,
    format: &str,
    output: &dyn Output,
) -> CliResult<()> {
    match command {
        ReferralCommand::Account(args) => commands::account::handle_account_command(engine, args, format, output).await,
        ReferralCommand::Commission(args) => {
            commands::commission::handle_commission_command(engine, args, format, output).await
        }
        ReferralCommand::Wallet(args) => commands::wallet::handle_wallet_command(engine, args, format, output).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        ReferralCli::command().debug_assert();
    }

    #[test]
    fn test_parse_enroll() {
        let cli = ReferralCli::try_parse_from([
            "referral", "account", "enroll", "--name", "Ada", "--email", "ada@example.com", "--sponsor", "ABCD2345",
        ])
        .unwrap();

        match cli.command {
            ReferralCommand::Account(AccountArgs {
                action: AccountAction::Enroll { name, sponsor, .. },
            }) => {
                assert_eq!(name, "Ada");
                assert_eq!(sponsor.as_deref(), Some("ABCD2345"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_adjustment() {
        let cli = ReferralCli::try_parse_from([
            "referral", "wallet", "adjust", "00112233445566778899aabbccddeeff", "--target", "earnings", "--delta",
            "-2.50", "--reason", "chargeback",
        ])
        .unwrap();

        match cli.command {
            ReferralCommand::Wallet(WalletArgs {
                action: WalletAction::Adjust { delta, .. },
            }) => assert_eq!(delta, "-2.50"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_show_requires_account_or_code() {
        assert!(ReferralCli::try_parse_from(["referral", "account", "show"]).is_err());
        assert!(ReferralCli::try_parse_from(["referral", "account", "show", "--code", "ABCD2345"]).is_ok());
    }
}
