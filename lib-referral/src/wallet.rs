//! Wallet flows outside commission crediting
//!
//! Deposits credit `balance`; withdrawals debit `referral_earnings`; admin
//! adjustments move either field by a signed delta. Every flow writes its
//! ledger record in the same guarded batch as the account, keyed so that a
//! retried request is applied once.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use lib_storage::StorageBackend;
use lib_types::{format_amount, AccountId, Amount, EventKey};

use crate::account::{unix_now, Account, AccountStatus};
use crate::config::RetryPolicy;
use crate::errors::{ReferralError, ReferralResult};
use crate::store::{encode, keys, AccountStore, LedgerEntry, UpdateOutcome};

pub const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub event_key: EventKey,
    pub account: AccountId,
    pub amount: Amount,
    pub recorded_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub request_key: EventKey,
    pub account: AccountId,
    pub amount: Amount,
    pub requested_at: u64,
}

/// Ledger field an admin adjustment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentTarget {
    Balance,
    ReferralEarnings,
}

impl AdjustmentTarget {
    fn field_name(&self) -> &'static str {
        match self {
            AdjustmentTarget::Balance => "balance",
            AdjustmentTarget::ReferralEarnings => "referral_earnings",
        }
    }
}

impl fmt::Display for AdjustmentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub id: String,
    pub account: AccountId,
    pub target: AdjustmentTarget,
    pub delta: i128,
    pub reason: String,
    pub applied_at: u64,
}

/// Account state after a keyed wallet operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletOutcome {
    pub account: Account,
    /// The key was already recorded; nothing changed
    pub duplicate: bool,
}

pub struct WalletService<B> {
    store: AccountStore<B>,
    retry: RetryPolicy,
}

impl<B: StorageBackend> WalletService<B> {
    pub fn new(store: AccountStore<B>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Credit `amount` to `balance` once per `event_key`
    pub async fn record_deposit(
        &self,
        event_key: &EventKey,
        account: &AccountId,
        amount: Amount,
    ) -> ReferralResult<WalletOutcome> {
        if amount == 0 {
            return Err(ReferralError::InvalidAmount("deposit must be greater than zero".into()));
        }

        let record = DepositRecord {
            event_key: event_key.clone(),
            account: *account,
            amount,
            recorded_at: unix_now(),
        };
        let ledger = LedgerEntry {
            key: keys::deposit(event_key),
            value: encode(&record)?,
        };

        let outcome = self
            .store
            .update_account(account, Some(ledger), &self.retry, "deposit", |a| {
                a.balance = a.balance.checked_add(amount).ok_or(ReferralError::Overflow)?;
                Ok(())
            })
            .await?;

        match outcome {
            UpdateOutcome::Applied(_) => {
                info!("Recorded deposit {} of {} for {}", event_key, format_amount(amount), account);
            }
            UpdateOutcome::AlreadyApplied => {
                let stored = self.deposit_record(event_key).await?;
                ensure_same_event(event_key, "deposit", stored.map(|r| (r.account, r.amount)), account, amount)?;
            }
        }
        self.finish(account, outcome).await
    }

    /// Debit `amount` from `referral_earnings` once per `request_key`
    pub async fn withdraw_earnings(
        &self,
        request_key: &EventKey,
        account: &AccountId,
        amount: Amount,
    ) -> ReferralResult<WalletOutcome> {
        if amount == 0 {
            return Err(ReferralError::InvalidAmount("withdrawal must be greater than zero".into()));
        }

        let record = WithdrawalRecord {
            request_key: request_key.clone(),
            account: *account,
            amount,
            requested_at: unix_now(),
        };
        let ledger = LedgerEntry {
            key: keys::withdrawal(request_key),
            value: encode(&record)?,
        };

        let outcome = self
            .store
            .update_account(account, Some(ledger), &self.retry, "withdrawal", |a| {
                if !a.is_active() {
                    return Err(ReferralError::AccountSuspended(a.id));
                }
                if a.referral_earnings < amount {
                    return Err(ReferralError::InsufficientEarnings {
                        available: a.referral_earnings,
                        requested: amount,
                    });
                }
                a.referral_earnings -= amount;
                Ok(())
            })
            .await?;

        match outcome {
            UpdateOutcome::Applied(_) => {
                info!("Withdrew {} of referral earnings for {}", format_amount(amount), account);
            }
            UpdateOutcome::AlreadyApplied => {
                let stored = self.withdrawal_record(request_key).await?;
                ensure_same_event(request_key, "withdrawal", stored.map(|r| (r.account, r.amount)), account, amount)?;
            }
        }
        self.finish(account, outcome).await
    }

    /// Signed manual correction of `balance` or `referral_earnings`
    pub async fn admin_adjust(
        &self,
        account: &AccountId,
        target: AdjustmentTarget,
        delta: i128,
        reason: &str,
    ) -> ReferralResult<(Account, AdjustmentRecord)> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ReferralError::InvalidAdjustment("a reason is required".into()));
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(ReferralError::InvalidAdjustment(format!(
                "reason exceeds {} characters",
                MAX_REASON_LEN
            )));
        }
        if delta == 0 {
            return Err(ReferralError::InvalidAdjustment("delta must be non-zero".into()));
        }

        let record = AdjustmentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            account: *account,
            target,
            delta,
            reason: reason.to_string(),
            applied_at: unix_now(),
        };
        let ledger = LedgerEntry {
            key: keys::adjustment(&record.id),
            value: encode(&record)?,
        };

        let outcome = self
            .store
            .update_account(account, Some(ledger), &self.retry, "admin adjustment", |a| {
                let field = match target {
                    AdjustmentTarget::Balance => &mut a.balance,
                    AdjustmentTarget::ReferralEarnings => &mut a.referral_earnings,
                };
                *field = apply_delta(*field, delta, target.field_name())?;
                Ok(())
            })
            .await?;

        match outcome {
            UpdateOutcome::Applied(updated) => {
                info!(
                    "Adjusted {} of {} by {} ({})",
                    target, account, delta, record.reason
                );
                Ok((updated, record))
            }
            // Fresh uuid per call; the marker cannot pre-exist
            UpdateOutcome::AlreadyApplied => Err(ReferralError::InvalidAdjustment(format!(
                "adjustment {} already recorded",
                record.id
            ))),
        }
    }

    pub async fn set_status(&self, account: &AccountId, status: AccountStatus) -> ReferralResult<Account> {
        let outcome = self
            .store
            .update_account(account, None, &self.retry, "status change", |a| {
                a.status = status;
                Ok(())
            })
            .await?;

        info!("Account {} is now {}", account, status);
        self.finish(account, outcome).await.map(|o| o.account)
    }

    pub async fn deposit_record(&self, event_key: &EventKey) -> ReferralResult<Option<DepositRecord>> {
        self.store.get_record(&keys::deposit(event_key)).await
    }

    pub async fn withdrawal_record(&self, request_key: &EventKey) -> ReferralResult<Option<WithdrawalRecord>> {
        self.store.get_record(&keys::withdrawal(request_key)).await
    }

    async fn finish(&self, account: &AccountId, outcome: UpdateOutcome) -> ReferralResult<WalletOutcome> {
        match outcome {
            UpdateOutcome::Applied(account) => Ok(WalletOutcome { account, duplicate: false }),
            UpdateOutcome::AlreadyApplied => Ok(WalletOutcome {
                account: self.store.require(account).await?,
                duplicate: true,
            }),
        }
    }
}

fn apply_delta(current: Amount, delta: i128, field: &'static str) -> ReferralResult<Amount> {
    if delta >= 0 {
        current.checked_add(delta.unsigned_abs()).ok_or(ReferralError::Overflow)
    } else {
        current
            .checked_sub(delta.unsigned_abs())
            .ok_or(ReferralError::NegativeResult { field, current, delta })
    }
}

/// A replayed key must carry the same account and amount as its stored record
fn ensure_same_event(
    key: &EventKey,
    operation: &'static str,
    stored: Option<(AccountId, Amount)>,
    account: &AccountId,
    amount: Amount,
) -> ReferralResult<()> {
    match stored {
        Some((stored_account, stored_amount)) if stored_account == *account && stored_amount == amount => Ok(()),
        _ => {
            warn!("{} key {} replayed with a different account or amount", operation, key);
            Err(ReferralError::EventKeyConflict {
                key: key.as_str().to_string(),
                operation,
            })
        }
    }
}
