//! Wallet commands: deposit, withdraw, adjust

use serde_json::json;
use lib_referral::{format_amount, ReferralEngine};
use lib_storage::StorageBackend;

use crate::argument_parsing::{WalletAction, WalletArgs};
use crate::commands::render;
use crate::error::CliResult;
use crate::logic::{self, account_view};
use crate::output::Output;

pub async fn handle_wallet_command<B: StorageBackend>(
    engine: &ReferralEngine<B>,
    args: WalletArgs,
    format: &str,
    output: &dyn Output,
) -> CliResult<()> {
    match args.action {
        WalletAction::Deposit { account, amount, event } => {
            let id = logic::parse_account_id(&account)?;
            let amount = logic::parse_positive_amount(&amount)?;
            let key = logic::event_key_or_generate(event.as_deref())?;

            let outcome = engine.record_deposit(&key, &id, amount).await?;
            if outcome.duplicate {
                output.info(&format!("Deposit {} was already recorded", key))?;
            } else {
                output.success(&format!("Deposited {} ({})", format_amount(amount), key))?;
            }
            render(output, "Account", &account_view(&outcome.account), format)
        }

        WalletAction::Withdraw { account, amount, request } => {
            let id = logic::parse_account_id(&account)?;
            let amount = logic::parse_positive_amount(&amount)?;
            let key = logic::event_key_or_generate(request.as_deref())?;

            let outcome = engine.withdraw_earnings(&key, &id, amount).await?;
            if outcome.duplicate {
                output.info(&format!("Withdrawal {} was already processed", key))?;
            } else {
                output.success(&format!("Withdrew {} of referral earnings ({})", format_amount(amount), key))?;
            }
            render(output, "Account", &account_view(&outcome.account), format)
        }

        WalletAction::Adjust { account, target, delta, reason } => {
            let id = logic::parse_account_id(&account)?;
            let target = logic::parse_adjustment_target(&target)?;
            let delta = logic::parse_signed_amount(&delta)?;

            let (updated, record) = engine.admin_adjust(&id, target, delta, &reason).await?;
            output.success(&format!("Adjusted {} by {} ({})", target, delta, record.id))?;

            let mut view = account_view(&updated);
            view["adjustment_id"] = json!(record.id);
            render(output, "Account", &view, format)
        }
    }
}
