//! Account commands: enroll, show, downline, reconcile, suspend/reactivate

use serde_json::json;
use lib_referral::{AccountStatus, ReferralEngine, ReferralError};
use lib_storage::StorageBackend;

use crate::argument_parsing::{AccountAction, AccountArgs};
use crate::commands::render;
use crate::error::CliResult;
use crate::logic::{self, account_view, downline_view};
use crate::output::Output;

pub async fn handle_account_command<B: StorageBackend>(
    engine: &ReferralEngine<B>,
    args: AccountArgs,
    format: &str,
    output: &dyn Output,
) -> CliResult<()> {
    match args.action {
        AccountAction::Enroll { name, email, sponsor } => {
            let outcome = engine.enroll(&name, &email, sponsor.as_deref()).await?;
            if let Some(warning) = outcome.warning() {
                output.warning(&warning)?;
            }
            output.success(&format!(
                "Enrolled {} with referral code {}",
                outcome.account.id, outcome.account.referral_code
            ))?;
            render(output, "Account", &account_view(&outcome.account), format)
        }

        AccountAction::Show { account, code } => {
            let found = match (account, code) {
                (Some(id), _) => {
                    let id = logic::parse_account_id(&id)?;
                    engine.account(&id).await?
                }
                (None, Some(code)) => {
                    let code = logic::parse_referral_code(&code)?;
                    engine.find_by_referral_code(&code).await?
                }
                (None, None) => None,
            };

            match found {
                Some(account) => render(output, "Account", &account_view(&account), format),
                None => {
                    output.error("No matching account")?;
                    Ok(())
                }
            }
        }

        AccountAction::Downline { account, list } => {
            let id = logic::parse_account_id(&account)?;
            let counts = engine.downline_counts(&id).await?;
            let mut view = downline_view(&id, &counts);

            if list {
                let direct = engine.direct_referrals(&id).await?;
                view["direct_referrals"] = json!(direct.iter().map(|d| d.to_hex()).collect::<Vec<_>>());
            }
            render(output, "Downline", &view, format)
        }

        AccountAction::Reconcile { account } => {
            let id = logic::parse_account_id(&account)?;
            let result = engine.reconcile_direct_referral_count(&id).await?;
            if result.drifted() {
                output.warning(&format!(
                    "Direct referral count corrected from {} to {}",
                    result.previous, result.actual
                ))?;
            } else {
                output.success(&format!("Direct referral count {} is consistent", result.actual))?;
            }
            Ok(())
        }

        AccountAction::Suspend { account } => set_status(engine, &account, AccountStatus::Suspended, output).await,

        AccountAction::Reactivate { account } => set_status(engine, &account, AccountStatus::Active, output).await,
    }
}

async fn set_status<B: StorageBackend>(
    engine: &ReferralEngine<B>,
    account: &str,
    status: AccountStatus,
    output: &dyn Output,
) -> CliResult<()> {
    let id = logic::parse_account_id(account)?;
    match engine.set_status(&id, status).await {
        Ok(updated) => output.success(&format!("Account {} is now {}", updated.id, updated.status)),
        Err(ReferralError::UnknownAccount(id)) => {
            output.error(&format!("Unknown account {}", id))?;
            Err(ReferralError::UnknownAccount(id).into())
        }
        Err(e) => Err(e.into()),
    }
}
