//! Commission fan-out
//!
//! Applies one qualifying event to the beneficiary's ancestor chain as a
//! single guarded batch:
//!
//! - guard `cmsn/<event>` absent (idempotency)
//! - guard every credited ancestor unchanged since it was read
//! - put every credited ancestor and the commission record
//!
//! Either all ancestors are credited and the record exists, or nothing
//! changed. A stale read loses the guard and the whole plan is rebuilt
//! from fresh state after a backoff.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use lib_storage::{BatchOp, Guard, StorageBackend};
use lib_types::{AccountId, Amount, EventKey};

use crate::account::unix_now;
use crate::commission::CommissionSchedule;
use crate::config::RetryPolicy;
use crate::errors::{ReferralError, ReferralResult};
use crate::notification::{Notification, NotificationDispatcher};
use crate::store::{encode, keys, AccountStore};

/// One ancestor's share of a commission event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionCredit {
    pub ancestor: AccountId,
    /// 1 = direct sponsor
    pub level: u8,
    pub amount: Amount,
}

/// Durable proof that an event was applied, stored under `cmsn/<event>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub event_key: EventKey,
    pub beneficiary: AccountId,
    pub gross_amount: Amount,
    /// Non-zero credits only, level 1 first
    pub credits: Vec<CommissionCredit>,
    /// Unix seconds
    pub applied_at: u64,
}

impl CommissionRecord {
    pub fn total_credited(&self) -> Amount {
        self.credits.iter().map(|c| c.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(CommissionRecord),
    /// The event key was already recorded; nothing was credited
    AlreadyApplied,
}

/// Caller-facing summary of a distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionOutcome {
    pub event_key: EventKey,
    /// Credits of the recorded distribution for this event
    pub credits: Vec<CommissionCredit>,
    /// True if an earlier call had already applied this event
    pub already_applied: bool,
}

impl DistributionOutcome {
    pub fn total_credited(&self) -> Amount {
        self.credits.iter().map(|c| c.amount).sum()
    }
}

/// Prepared commit for one attempt
struct FanOutPlan {
    record: CommissionRecord,
    guards: Vec<Guard>,
    ops: Vec<BatchOp>,
}

/// Distributes commissions up the ancestor chain
pub struct CommissionEngine<B> {
    store: AccountStore<B>,
    schedule: CommissionSchedule,
    retry: RetryPolicy,
    notifier: NotificationDispatcher,
}

impl<B: StorageBackend> CommissionEngine<B> {
    pub fn new(
        store: AccountStore<B>,
        schedule: CommissionSchedule,
        retry: RetryPolicy,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { store, schedule, retry, notifier }
    }

    pub fn schedule(&self) -> &CommissionSchedule {
        &self.schedule
    }

    /// Stored record for an event, if it was applied
    pub async fn record(&self, event_key: &EventKey) -> ReferralResult<Option<CommissionRecord>> {
        self.store.get_record(&keys::commission(event_key)).await
    }

    /// Apply `event_key` at most once
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `gross_amount` is zero
    /// - `UnknownAccount` if the beneficiary does not exist
    /// - `MissingAncestor` if a chain entry has no stored account
    /// - `EventKeyConflict` if the key was recorded for another beneficiary or amount
    /// - `RetriesExhausted` if every attempt lost a write race
    pub async fn apply(
        &self,
        beneficiary: &AccountId,
        gross_amount: Amount,
        event_key: &EventKey,
    ) -> ReferralResult<ApplyOutcome> {
        if gross_amount == 0 {
            return Err(ReferralError::InvalidAmount(
                "commission amount must be greater than zero".into(),
            ));
        }

        let record_key = keys::commission(event_key);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if let Some(existing) = self.store.get_record::<CommissionRecord>(&record_key).await? {
                if existing.beneficiary != *beneficiary || existing.gross_amount != gross_amount {
                    warn!(
                        "Commission event {} replayed for {} ({}) but recorded for {} ({})",
                        event_key, beneficiary, gross_amount, existing.beneficiary, existing.gross_amount
                    );
                    return Err(ReferralError::EventKeyConflict {
                        key: event_key.as_str().to_string(),
                        operation: "commission distribution",
                    });
                }
                debug!("Commission event {} already applied", event_key);
                return Ok(ApplyOutcome::AlreadyApplied);
            }

            let plan = self.plan(beneficiary, gross_amount, event_key, &record_key).await?;

            match self.store.commit(&plan.guards, &plan.ops).await {
                Ok(()) => {
                    info!(
                        "Applied commission event {} for {}: {} credits totalling {}",
                        event_key,
                        beneficiary,
                        plan.record.credits.len(),
                        plan.record.total_credited()
                    );
                    self.notify_sponsor(&plan.record);
                    return Ok(ApplyOutcome::Applied(plan.record));
                }
                Err(e) if e.is_conflict() => {
                    if attempt >= self.retry.max_attempts {
                        warn!(
                            "Commission event {} gave up after {} conflicting attempts",
                            event_key, attempt
                        );
                        return Err(ReferralError::RetriesExhausted {
                            operation: "commission distribution",
                            attempts: attempt,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    debug!(
                        "Commission event {} conflicted on attempt {}, retrying in {:?}",
                        event_key, attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply `event_key`, reporting a repeat as a successful no-op
    pub async fn distribute(
        &self,
        beneficiary: &AccountId,
        gross_amount: Amount,
        event_key: &EventKey,
    ) -> ReferralResult<DistributionOutcome> {
        match self.apply(beneficiary, gross_amount, event_key).await? {
            ApplyOutcome::Applied(record) => Ok(DistributionOutcome {
                event_key: record.event_key,
                credits: record.credits,
                already_applied: false,
            }),
            ApplyOutcome::AlreadyApplied => {
                let credits = self
                    .record(event_key)
                    .await?
                    .map(|r| r.credits)
                    .unwrap_or_default();
                Ok(DistributionOutcome {
                    event_key: event_key.clone(),
                    credits,
                    already_applied: true,
                })
            }
        }
    }

    async fn plan(
        &self,
        beneficiary: &AccountId,
        gross_amount: Amount,
        event_key: &EventKey,
        record_key: &[u8],
    ) -> ReferralResult<FanOutPlan> {
        let account = self.store.require(beneficiary).await?;
        let amounts = self.schedule.split(gross_amount, account.ancestors.len())?;

        let mut guards = vec![Guard::absent(record_key.to_vec())];
        let mut ops = Vec::with_capacity(amounts.len() + 1);
        let mut credits = Vec::with_capacity(amounts.len());

        for ((level, ancestor_id), amount) in account.ancestors.levels().zip(amounts) {
            if amount == 0 {
                continue;
            }

            let snapshot = self.store.snapshot(&ancestor_id).await?.ok_or(
                ReferralError::MissingAncestor {
                    account: *beneficiary,
                    ancestor: ancestor_id,
                },
            )?;

            let mut ancestor = snapshot.account;
            ancestor.credit_commission(amount)?;

            let key = keys::account(&ancestor_id);
            guards.push(Guard::equals(key.clone(), snapshot.raw));
            ops.push(BatchOp::put(key, encode(&ancestor)?));
            credits.push(CommissionCredit {
                ancestor: ancestor_id,
                level: level as u8,
                amount,
            });
        }

        let record = CommissionRecord {
            event_key: event_key.clone(),
            beneficiary: *beneficiary,
            gross_amount,
            credits,
            applied_at: unix_now(),
        };
        ops.push(BatchOp::put(record_key.to_vec(), encode(&record)?));

        Ok(FanOutPlan { record, guards, ops })
    }

    fn notify_sponsor(&self, record: &CommissionRecord) {
        if let Some(credit) = record.credits.iter().find(|c| c.level == 1) {
            self.notifier.dispatch(Notification::referral_bonus(
                credit.ancestor,
                record.event_key.clone(),
                record.beneficiary,
                credit.amount,
            ));
        }
    }
}
