//! Downline Query Service
//!
//! Per-level downline sizes, computed per request from the write-once
//! `down/<ancestor>/<level>/` index. Read-only apart from
//! [`DownlineService::reconcile_direct_referral_count`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use lib_storage::StorageBackend;
use lib_types::AccountId;

use crate::commission::MAX_LEVELS;
use crate::config::RetryPolicy;
use crate::errors::{ReferralError, ReferralResult};
use crate::store::{AccountStore, UpdateOutcome};

/// Descendant counts for levels 1..=5; absent levels are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownlineCounts([u64; MAX_LEVELS]);

impl DownlineCounts {
    pub fn new(counts: [u64; MAX_LEVELS]) -> Self {
        Self(counts)
    }

    /// Count at `level` (1-based); 0 outside 1..=5
    pub fn level(&self, level: usize) -> u64 {
        level
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn as_array(&self) -> [u64; MAX_LEVELS] {
        self.0
    }
}

/// Stored vs. index-derived direct referral count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub previous: u64,
    pub actual: u64,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.previous != self.actual
    }
}

pub struct DownlineService<B> {
    store: AccountStore<B>,
    retry: RetryPolicy,
}

impl<B: StorageBackend> DownlineService<B> {
    pub fn new(store: AccountStore<B>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn count_levels(&self, id: &AccountId) -> ReferralResult<DownlineCounts> {
        self.ensure_exists(id).await?;

        let mut counts = [0u64; MAX_LEVELS];
        for (i, count) in counts.iter_mut().enumerate() {
            *count = self.store.count_downline_level(id, i + 1).await?;
        }
        Ok(DownlineCounts(counts))
    }

    /// Ids of accounts directly sponsored by `id`
    pub async fn direct_referrals(&self, id: &AccountId) -> ReferralResult<Vec<AccountId>> {
        self.ensure_exists(id).await?;
        self.store.downline_level_members(id, 1).await
    }

    /// Reset `direct_referral_count` to the indexed level-1 count
    pub async fn reconcile_direct_referral_count(&self, id: &AccountId) -> ReferralResult<Reconciliation> {
        let previous = self.store.require(id).await?.direct_referral_count;
        let actual = self.store.count_downline_level(id, 1).await?;

        if previous == actual {
            return Ok(Reconciliation { previous, actual });
        }

        warn!(
            "Direct referral count of {} drifted: stored {}, indexed {}",
            id, previous, actual
        );
        let outcome = self
            .store
            .update_account(id, None, &self.retry, "referral count reconciliation", |a| {
                a.direct_referral_count = actual;
                Ok(())
            })
            .await?;

        if let UpdateOutcome::Applied(account) = outcome {
            info!("Reconciled direct referral count of {} to {}", id, account.direct_referral_count);
        }
        Ok(Reconciliation { previous, actual })
    }

    async fn ensure_exists(&self, id: &AccountId) -> ReferralResult<()> {
        if self.store.get(id).await?.is_none() {
            return Err(ReferralError::UnknownAccount(*id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AncestorChain};
    use lib_storage::MemoryBackend;
    use lib_types::ReferralCode;

    async fn insert(store: &AccountStore<MemoryBackend>, n: u8, sponsor: Option<&Account>) -> Account {
        let ancestors = sponsor
            .map(|s| AncestorChain::sponsored_by(s.id, &s.ancestors))
            .unwrap_or_default();
        let account = Account::new(
            AccountId::new([n; 16]),
            format!("User {}", n),
            format!("user{}@example.com", n),
            ReferralCode::parse(&format!("CODE{:04}", n)).unwrap(),
            None,
            ancestors,
        );
        store.insert_new(&account).await.unwrap();
        account
    }

    #[test]
    fn test_counts_accessors() {
        let counts = DownlineCounts::new([3, 2, 1, 0, 0]);
        assert_eq!(counts.level(1), 3);
        assert_eq!(counts.level(0), 0);
        assert_eq!(counts.level(6), 0);
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.as_array().len(), MAX_LEVELS);
    }

    #[tokio::test]
    async fn test_counts_per_level() {
        let store = AccountStore::new(MemoryBackend::new());
        let root = insert(&store, 1, None).await;
        let child = insert(&store, 2, Some(&root)).await;
        insert(&store, 3, Some(&root)).await;
        insert(&store, 4, Some(&child)).await;

        let service = DownlineService::new(store.clone(), RetryPolicy::default());
        assert_eq!(service.count_levels(&root.id).await.unwrap().as_array(), [2, 1, 0, 0, 0]);
        assert_eq!(service.count_levels(&child.id).await.unwrap().as_array(), [1, 0, 0, 0, 0]);

        let mut direct = service.direct_referrals(&root.id).await.unwrap();
        direct.sort();
        assert_eq!(direct, vec![AccountId::new([2; 16]), AccountId::new([3; 16])]);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = DownlineService::new(store, RetryPolicy::default());
        assert!(matches!(
            service.count_levels(&AccountId::new([7; 16])).await,
            Err(ReferralError::UnknownAccount(_))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let store = AccountStore::new(MemoryBackend::new());
        let root = insert(&store, 1, None).await;
        insert(&store, 2, Some(&root)).await;
        insert(&store, 3, Some(&root)).await;

        // Accounts were inserted directly, so the stored counter is still 0
        let service = DownlineService::new(store.clone(), RetryPolicy::default());
        let first = service.reconcile_direct_referral_count(&root.id).await.unwrap();
        assert_eq!(first, Reconciliation { previous: 0, actual: 2 });
        assert!(first.drifted());
        assert_eq!(store.require(&root.id).await.unwrap().direct_referral_count, 2);

        let second = service.reconcile_direct_referral_count(&root.id).await.unwrap();
        assert!(!second.drifted());
    }
}
