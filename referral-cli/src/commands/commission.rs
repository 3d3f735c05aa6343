//! Commission commands: distribute, pay, record

use serde_json::json;
use lib_referral::{format_amount, ReferralEngine};
use lib_storage::StorageBackend;

use crate::argument_parsing::{CommissionAction, CommissionArgs};
use crate::commands::render;
use crate::error::CliResult;
use crate::logic::{self, distribution_view};
use crate::output::Output;

pub async fn handle_commission_command<B: StorageBackend>(
    engine: &ReferralEngine<B>,
    args: CommissionArgs,
    format: &str,
    output: &dyn Output,
) -> CliResult<()> {
    match args.action {
        CommissionAction::Distribute { account, amount, event } => {
            let id = logic::parse_account_id(&account)?;
            let gross = logic::parse_positive_amount(&amount)?;
            let key = logic::event_key_or_generate(event.as_deref())?;

            let outcome = engine.distribute_commission_for_event(&key, &id, gross).await?;
            if outcome.already_applied {
                output.info(&format!("Event {} was already applied; nothing credited", key))?;
            } else {
                output.success(&format!(
                    "Credited {} across {} ancestors",
                    format_amount(outcome.total_credited()),
                    outcome.credits.len()
                ))?;
            }
            render(output, "Distribution", &distribution_view(&outcome), format)
        }

        CommissionAction::Pay { account, amount, event } => {
            let id = logic::parse_account_id(&account)?;
            let gross = logic::parse_positive_amount(&amount)?;
            let key = logic::event_key_or_generate(Some(&event))?;

            let outcome = engine.confirm_qualifying_payment(&key, &id, gross).await?;
            if outcome.deposit.duplicate && outcome.commission.already_applied {
                output.info(&format!("Payment {} was already confirmed", key))?;
            } else {
                output.success(&format!("Confirmed payment {} of {}", key, format_amount(gross)))?;
            }

            let mut view = distribution_view(&outcome.commission);
            view["balance"] = json!(format_amount(outcome.deposit.account.balance));
            render(output, "Payment", &view, format)
        }

        CommissionAction::Record { event } => {
            let key = logic::event_key_or_generate(Some(&event))?;
            match engine.commission_record(&key).await? {
                Some(record) => {
                    let view = json!({
                        "event_key": record.event_key.as_str(),
                        "beneficiary": record.beneficiary.to_hex(),
                        "gross_amount": format_amount(record.gross_amount),
                        "total_credited": format_amount(record.total_credited()),
                        "credits": record.credits.len(),
                        "applied_at": record.applied_at,
                    });
                    render(output, "Commission Record", &view, format)
                }
                None => {
                    output.error(&format!("No commission recorded for event {}", key))?;
                    Ok(())
                }
            }
        }
    }
}
