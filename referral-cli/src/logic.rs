//! Pure argument parsing and view building
//!
//! No I/O here: everything takes values and returns values so it can be
//! tested without a store.

use serde_json::{json, Value};
use lib_referral::{
    format_amount, parse_amount, Account, AccountId, AdjustmentTarget, Amount, DistributionOutcome,
    DownlineCounts, EventKey, ReferralCode,
};

use crate::error::{CliError, CliResult};

pub const OUTPUT_FORMATS: &[&str] = &["table", "json"];
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn parse_account_id(input: &str) -> CliResult<AccountId> {
    AccountId::from_hex(input.trim()).map_err(|e| CliError::invalid_argument("account", e.to_string()))
}

pub fn parse_referral_code(input: &str) -> CliResult<ReferralCode> {
    ReferralCode::parse(input).map_err(|e| CliError::invalid_argument("code", e.to_string()))
}

/// Decimal amount ("100", "12.50") in minor units; zero rejected
pub fn parse_positive_amount(input: &str) -> CliResult<Amount> {
    let amount = parse_amount(input).map_err(|e| CliError::invalid_argument("amount", e.to_string()))?;
    if amount == 0 {
        return Err(CliError::invalid_argument("amount", "must be greater than zero"));
    }
    Ok(amount)
}

/// Signed decimal delta ("-12.50", "+5", "5") in minor units
pub fn parse_signed_amount(input: &str) -> CliResult<i128> {
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let magnitude = parse_amount(digits).map_err(|e| CliError::invalid_argument("delta", e.to_string()))?;
    let magnitude = i128::try_from(magnitude)
        .map_err(|_| CliError::invalid_argument("delta", "out of range"))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Caller-supplied event key, or a fresh one
pub fn event_key_or_generate(input: Option<&str>) -> CliResult<EventKey> {
    match input {
        Some(raw) => EventKey::new(raw.trim()).map_err(|e| CliError::invalid_argument("event", e.to_string())),
        None => Ok(EventKey::generate()),
    }
}

pub fn parse_adjustment_target(input: &str) -> CliResult<AdjustmentTarget> {
    match input.trim().to_lowercase().as_str() {
        "balance" => Ok(AdjustmentTarget::Balance),
        "earnings" | "referral_earnings" | "referral-earnings" => Ok(AdjustmentTarget::ReferralEarnings),
        other => Err(CliError::invalid_argument(
            "target",
            format!("unknown target '{}'; expected balance or earnings", other),
        )),
    }
}

pub fn validate_output_format(format: &str) -> CliResult<()> {
    if OUTPUT_FORMATS.contains(&format) {
        Ok(())
    } else {
        Err(CliError::invalid_argument(
            "format",
            format!("'{}' is not one of {}", format, OUTPUT_FORMATS.join(", ")),
        ))
    }
}

pub fn validate_log_level(level: &str) -> CliResult<()> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(CliError::ConfigError(format!(
            "Invalid log level '{}'. Supported: {}",
            level,
            LOG_LEVELS.join(", ")
        )))
    }
}

// ============================================================================
// Views
// ============================================================================

pub fn account_view(account: &Account) -> Value {
    json!({
        "id": account.id.to_hex(),
        "full_name": account.full_name,
        "email": account.email,
        "referral_code": account.referral_code.as_str(),
        "sponsor_code": account.sponsor_code.as_ref().map(|c| c.as_str().to_string()),
        "ancestors": account.ancestors.as_slice().iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
        "balance": format_amount(account.balance),
        "referral_earnings": format_amount(account.referral_earnings),
        "lifetime_earnings": format_amount(account.lifetime_earnings),
        "direct_referral_count": account.direct_referral_count,
        "status": account.status.to_string(),
        "created_at": account.created_at,
    })
}

pub fn distribution_view(outcome: &DistributionOutcome) -> Value {
    json!({
        "event_key": outcome.event_key.as_str(),
        "already_applied": outcome.already_applied,
        "total_credited": format_amount(outcome.total_credited()),
        "credits": outcome.credits.iter().map(|c| json!({
            "level": c.level,
            "ancestor": c.ancestor.to_hex(),
            "amount": format_amount(c.amount),
        })).collect::<Vec<_>>(),
    })
}

pub fn downline_view(account: &AccountId, counts: &DownlineCounts) -> Value {
    json!({
        "account": account.to_hex(),
        "levels": counts.as_array(),
        "total": counts.total(),
    })
}

/// Render `data` as pretty JSON or a two-column table
pub fn format_output(data: &Value, format: &str) -> CliResult<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(data)?),
        _ => {
            if let Some(obj) = data.as_object() {
                let mut result = String::new();
                for (key, value) in obj {
                    result.push_str(&format!("{:<24} {}\n", key, table_cell(value)));
                }
                Ok(result)
            } else if let Some(array) = data.as_array() {
                let mut result = String::new();
                for (i, item) in array.iter().enumerate() {
                    result.push_str(&format!("[{}] {}\n", i, table_cell(item)));
                }
                Ok(result)
            } else {
                Ok(table_cell(data))
            }
        }
    }
}

fn table_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
