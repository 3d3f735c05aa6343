//! Referral Command-Line Interface
//!
//! Entry point for the `referral` binary.

use referral_cli::run_cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_cli().await
}
