//! Referral CLI Library
//!
//! Operator command-line interface for the referral engine: enroll
//! accounts, distribute commissions, move money and inspect downlines.
//!
//! ## Architecture
//!
//! - **Functional Core** (`logic` module): parsing, validation and view building
//! - **Imperative Shell** (`commands` module): engine calls and printing
//! - **Error Handling** (`error` module): CLI error type wrapping engine errors
//! - **Output Abstraction** (`output` module): testable printing interface

pub mod argument_parsing;
pub mod cli_config;
pub mod commands;
pub mod error;
pub mod logic;
pub mod output;

pub use argument_parsing::{run_cli, run_command, run_with_settings, ReferralCli, ReferralCommand};
pub use error::{CliError, CliResult};
pub use output::Output;

/// Referral CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
