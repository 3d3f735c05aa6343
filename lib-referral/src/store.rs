//! Account Store
//!
//! Persists accounts and their indexes on any [`StorageBackend`].
//!
//! # Key layout
//!
//! | key                                   | value                      |
//! |---------------------------------------|----------------------------|
//! | `acct/<id>`                           | bincode [`Account`]        |
//! | `code/<referral code>`                | account id bytes           |
//! | `email/<normalized email>`            | account id bytes           |
//! | `down/<ancestor>/<level>/<descendant>`| empty (write-once index)   |
//! | `cmsn/<event key>`                    | bincode commission record  |
//! | `dep/<event key>`                     | bincode deposit record     |
//! | `wdrw/<request key>`                  | bincode withdrawal record  |
//! | `adj/<adjustment id>`                 | bincode adjustment record  |
//!
//! # Concurrency
//!
//! Every mutation of an existing account is optimistic: read the raw bytes,
//! mutate a copy, and commit with a guard that the bytes are unchanged.
//! Lost updates are impossible; a stale writer re-reads and retries.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use lib_storage::{BatchOp, Guard, StorageBackend};
use lib_types::{AccountId, EventKey, ReferralCode};

use crate::account::Account;
use crate::commission::MAX_LEVELS;
use crate::config::RetryPolicy;
use crate::errors::{ReferralError, ReferralResult};

/// Storage key construction
pub(crate) mod keys {
    use super::*;

    pub const ACCOUNT_PREFIX: &str = "acct/";

    pub fn account(id: &AccountId) -> Vec<u8> {
        format!("{}{}", ACCOUNT_PREFIX, id.to_hex()).into_bytes()
    }

    pub fn referral_code(code: &ReferralCode) -> Vec<u8> {
        format!("code/{}", code.as_str()).into_bytes()
    }

    pub fn email(normalized: &str) -> Vec<u8> {
        format!("email/{}", normalized).into_bytes()
    }

    pub fn downline_level_prefix(ancestor: &AccountId, level: usize) -> Vec<u8> {
        format!("down/{}/{}/", ancestor.to_hex(), level).into_bytes()
    }

    pub fn downline_entry(ancestor: &AccountId, level: usize, descendant: &AccountId) -> Vec<u8> {
        format!("down/{}/{}/{}", ancestor.to_hex(), level, descendant.to_hex()).into_bytes()
    }

    pub fn commission(event: &EventKey) -> Vec<u8> {
        format!("cmsn/{}", event.as_str()).into_bytes()
    }

    pub fn deposit(event: &EventKey) -> Vec<u8> {
        format!("dep/{}", event.as_str()).into_bytes()
    }

    pub fn withdrawal(request: &EventKey) -> Vec<u8> {
        format!("wdrw/{}", request.as_str()).into_bytes()
    }

    pub fn adjustment(id: &str) -> Vec<u8> {
        format!("adj/{}", id).into_bytes()
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> ReferralResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ReferralResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Account as read, plus the exact stored bytes used as the commit guard
#[derive(Debug, Clone)]
pub(crate) struct AccountSnapshot {
    pub account: Account,
    pub raw: Vec<u8>,
}

/// Ledger record written atomically with an account update
///
/// The key doubles as an idempotency marker: if it already exists the
/// update is not applied again.
#[derive(Debug, Clone)]
pub(crate) struct LedgerEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Result of an idempotent single-account update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update committed; carries the account as written
    Applied(Account),
    /// The ledger marker already existed; nothing was written
    AlreadyApplied,
}

/// Account persistence over a storage backend
pub struct AccountStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for AccountStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StorageBackend> AccountStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, id: &AccountId) -> ReferralResult<Option<Account>> {
        Ok(self.snapshot(id).await?.map(|s| s.account))
    }

    /// Like [`get`](Self::get) but an absent account is `UnknownAccount`
    pub async fn require(&self, id: &AccountId) -> ReferralResult<Account> {
        self.get(id).await?.ok_or(ReferralError::UnknownAccount(*id))
    }

    pub(crate) async fn snapshot(&self, id: &AccountId) -> ReferralResult<Option<AccountSnapshot>> {
        match self.backend.get(&keys::account(id)).await? {
            Some(raw) => {
                let account = decode(&raw)?;
                Ok(Some(AccountSnapshot { account, raw }))
            }
            None => Ok(None),
        }
    }

    pub async fn find_by_referral_code(&self, code: &ReferralCode) -> ReferralResult<Option<Account>> {
        match self.backend.get(&keys::referral_code(code)).await? {
            Some(raw_id) => {
                let id = AccountId::from_slice(&raw_id)?;
                self.get(&id).await
            }
            None => Ok(None),
        }
    }

    pub async fn referral_code_exists(&self, code: &ReferralCode) -> ReferralResult<bool> {
        Ok(self.backend.contains(&keys::referral_code(code)).await?)
    }

    pub async fn email_exists(&self, normalized_email: &str) -> ReferralResult<bool> {
        Ok(self.backend.contains(&keys::email(normalized_email)).await?)
    }

    /// Every stored account, ordered by id
    pub async fn list_accounts(&self) -> ReferralResult<Vec<Account>> {
        self.backend
            .scan_prefix(keys::ACCOUNT_PREFIX.as_bytes(), None)
            .await?
            .iter()
            .map(|(_, raw)| decode(raw))
            .collect()
    }

    /// Number of accounts whose ancestor at `level` is `id`
    pub async fn count_downline_level(&self, id: &AccountId, level: usize) -> ReferralResult<u64> {
        let count = self
            .backend
            .count_prefix(&keys::downline_level_prefix(id, level))
            .await?;
        Ok(count as u64)
    }

    /// Ids of accounts whose ancestor at `level` is `id`
    pub async fn downline_level_members(&self, id: &AccountId, level: usize) -> ReferralResult<Vec<AccountId>> {
        let prefix = keys::downline_level_prefix(id, level);
        let entries = self.backend.scan_prefix(&prefix, None).await?;

        entries
            .iter()
            .map(|(key, _)| {
                let hex = std::str::from_utf8(&key[prefix.len()..])
                    .map_err(|e| ReferralError::Serialization(e.to_string()))?;
                Ok(AccountId::from_hex(hex)?)
            })
            .collect()
    }

    pub(crate) async fn get_record<T: DeserializeOwned>(&self, key: &[u8]) -> ReferralResult<Option<T>> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a brand-new account with its indexes in one atomic batch
    ///
    /// Fails with a storage conflict if the id, referral code or email is
    /// already taken; nothing is written in that case.
    pub async fn insert_new(&self, account: &Account) -> ReferralResult<()> {
        let account_key = keys::account(&account.id);
        let code_key = keys::referral_code(&account.referral_code);
        let email_key = keys::email(&account.email);
        let id_bytes = account.id.as_bytes().to_vec();

        let guards = vec![
            Guard::absent(account_key.clone()),
            Guard::absent(code_key.clone()),
            Guard::absent(email_key.clone()),
        ];

        let mut ops = Vec::with_capacity(3 + MAX_LEVELS);
        ops.push(BatchOp::put(account_key, encode(account)?));
        ops.push(BatchOp::put(code_key, id_bytes.clone()));
        ops.push(BatchOp::put(email_key, id_bytes));
        for (level, ancestor) in account.ancestors.levels() {
            ops.push(BatchOp::put(
                keys::downline_entry(&ancestor, level, &account.id),
                Vec::new(),
            ));
        }

        self.backend.write_batch_guarded(&guards, &ops).await?;
        debug!(
            "Stored account {} with {} ancestor index entries",
            account.id,
            account.ancestors.len()
        );
        Ok(())
    }

    /// Commit a prepared multi-key batch
    pub(crate) async fn commit(&self, guards: &[Guard], ops: &[BatchOp]) -> ReferralResult<()> {
        Ok(self.backend.write_batch_guarded(guards, ops).await?)
    }

    /// Optimistically update one account, retrying on conflict
    ///
    /// `mutate` runs against a fresh copy on every attempt; an error from it
    /// aborts without writing. When `ledger` is given, its key must not
    /// exist and is written in the same batch; an existing key yields
    /// `UpdateOutcome::AlreadyApplied`.
    pub(crate) async fn update_account<F>(
        &self,
        id: &AccountId,
        ledger: Option<LedgerEntry>,
        policy: &RetryPolicy,
        operation: &'static str,
        mut mutate: F,
    ) -> ReferralResult<UpdateOutcome>
    where
        F: FnMut(&mut Account) -> ReferralResult<()> + Send,
    {
        let account_key = keys::account(id);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if let Some(entry) = &ledger {
                if self.backend.contains(&entry.key).await? {
                    return Ok(UpdateOutcome::AlreadyApplied);
                }
            }

            let snapshot = self
                .snapshot(id)
                .await?
                .ok_or(ReferralError::UnknownAccount(*id))?;
            let mut updated = snapshot.account.clone();
            mutate(&mut updated)?;

            let mut guards = vec![Guard::equals(account_key.clone(), snapshot.raw)];
            let mut ops = vec![BatchOp::put(account_key.clone(), encode(&updated)?)];
            if let Some(entry) = &ledger {
                guards.push(Guard::absent(entry.key.clone()));
                ops.push(BatchOp::put(entry.key.clone(), entry.value.clone()));
            }

            match self.backend.write_batch_guarded(&guards, &ops).await {
                Ok(()) => return Ok(UpdateOutcome::Applied(updated)),
                Err(e) if e.is_conflict() => {
                    if attempt >= policy.max_attempts {
                        warn!("{} on account {} exhausted {} attempts", operation, id, attempt);
                        return Err(ReferralError::RetriesExhausted { operation, attempts: attempt });
                    }
                    let delay = policy.delay_for(attempt);
                    debug!("{} on account {} conflicted, retrying in {:?}", operation, id, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
