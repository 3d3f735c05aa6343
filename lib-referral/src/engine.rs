//! Referral engine facade
//!
//! Wires the services over one shared [`AccountStore`] and exposes the
//! public operations.

use std::sync::Arc;
use tokio::task::JoinHandle;
use lib_storage::StorageBackend;
use lib_types::{AccountId, Amount, EventKey, ReferralCode};

use crate::account::{Account, AccountStatus};
use crate::commission::{ApplyOutcome, CommissionEngine, CommissionRecord, DistributionOutcome, MAX_LEVELS};
use crate::config::ReferralConfig;
use crate::downline::{DownlineCounts, DownlineService, Reconciliation};
use crate::enrollment::{EnrollmentOutcome, EnrollmentService, NewAccount};
use crate::errors::ReferralResult;
use crate::notification::{NotificationDispatcher, TracingSink};
use crate::store::AccountStore;
use crate::wallet::{AdjustmentRecord, AdjustmentTarget, WalletOutcome, WalletService};

/// Result of a confirmed qualifying payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub deposit: WalletOutcome,
    pub commission: DistributionOutcome,
}

pub struct ReferralEngine<B> {
    config: ReferralConfig,
    store: AccountStore<B>,
    enrollment: EnrollmentService<B>,
    commission: CommissionEngine<B>,
    downline: DownlineService<B>,
    wallet: WalletService<B>,
}

impl<B: StorageBackend> ReferralEngine<B> {
    /// Build an engine over `backend`; fails on an invalid config
    pub fn new(backend: B, config: ReferralConfig, notifier: NotificationDispatcher) -> ReferralResult<Self> {
        config.validate()?;
        let schedule = config.commission.schedule()?;
        let store = AccountStore::new(backend);

        Ok(Self {
            enrollment: EnrollmentService::new(
                store.clone(),
                config.enrollment.clone(),
                config.retry.clone(),
                notifier.clone(),
            ),
            commission: CommissionEngine::new(store.clone(), schedule, config.retry.clone(), notifier),
            downline: DownlineService::new(store.clone(), config.retry.clone()),
            wallet: WalletService::new(store.clone(), config.retry.clone()),
            store,
            config,
        })
    }

    /// Engine with notifications logged through [`TracingSink`]
    ///
    /// Must be called inside a tokio runtime. Drop the engine, then await the
    /// handle to flush pending notifications.
    pub fn with_tracing_notifications(backend: B, config: ReferralConfig) -> ReferralResult<(Self, JoinHandle<()>)> {
        let (notifier, worker) =
            NotificationDispatcher::spawn(Arc::new(TracingSink), config.notifications.queue_capacity);
        let engine = Self::new(backend, config, notifier)?;
        Ok((engine, worker))
    }

    pub fn config(&self) -> &ReferralConfig {
        &self.config
    }

    pub fn store(&self) -> &AccountStore<B> {
        &self.store
    }

    // =========================================================================
    // Enrollment
    // =========================================================================

    pub async fn enroll(
        &self,
        full_name: &str,
        email: &str,
        sponsor_code: Option<&str>,
    ) -> ReferralResult<EnrollmentOutcome> {
        self.enrollment
            .enroll(NewAccount::new(full_name, email), sponsor_code)
            .await
    }

    pub async fn account(&self, id: &AccountId) -> ReferralResult<Option<Account>> {
        self.store.get(id).await
    }

    pub async fn require_account(&self, id: &AccountId) -> ReferralResult<Account> {
        self.store.require(id).await
    }

    pub async fn find_by_referral_code(&self, code: &ReferralCode) -> ReferralResult<Option<Account>> {
        self.store.find_by_referral_code(code).await
    }

    // =========================================================================
    // Commission
    // =========================================================================

    /// Distribute under a freshly generated event key
    pub async fn distribute_commission(
        &self,
        beneficiary: &AccountId,
        gross_amount: Amount,
    ) -> ReferralResult<DistributionOutcome> {
        self.commission
            .distribute(beneficiary, gross_amount, &EventKey::generate())
            .await
    }

    /// Distribute under the caller's stable event key; repeats are no-ops
    pub async fn distribute_commission_for_event(
        &self,
        event_key: &EventKey,
        beneficiary: &AccountId,
        gross_amount: Amount,
    ) -> ReferralResult<DistributionOutcome> {
        self.commission.distribute(beneficiary, gross_amount, event_key).await
    }

    /// Raw apply step, reporting `AlreadyApplied` for repeats
    pub async fn apply_commission(
        &self,
        event_key: &EventKey,
        beneficiary: &AccountId,
        gross_amount: Amount,
    ) -> ReferralResult<ApplyOutcome> {
        self.commission.apply(beneficiary, gross_amount, event_key).await
    }

    pub async fn commission_record(&self, event_key: &EventKey) -> ReferralResult<Option<CommissionRecord>> {
        self.commission.record(event_key).await
    }

    /// Credit the deposit, then distribute commission under the same key
    ///
    /// Both steps are keyed, so retrying the whole call after a failure
    /// never double-credits either side.
    pub async fn confirm_qualifying_payment(
        &self,
        event_key: &EventKey,
        account: &AccountId,
        amount: Amount,
    ) -> ReferralResult<PaymentOutcome> {
        let deposit = self.wallet.record_deposit(event_key, account, amount).await?;
        let commission = self.commission.distribute(account, amount, event_key).await?;
        Ok(PaymentOutcome { deposit, commission })
    }

    // =========================================================================
    // Downline
    // =========================================================================

    pub async fn count_downline_levels(&self, id: &AccountId) -> ReferralResult<[u64; MAX_LEVELS]> {
        Ok(self.downline.count_levels(id).await?.as_array())
    }

    pub async fn downline_counts(&self, id: &AccountId) -> ReferralResult<DownlineCounts> {
        self.downline.count_levels(id).await
    }

    pub async fn direct_referrals(&self, id: &AccountId) -> ReferralResult<Vec<AccountId>> {
        self.downline.direct_referrals(id).await
    }

    pub async fn reconcile_direct_referral_count(&self, id: &AccountId) -> ReferralResult<Reconciliation> {
        self.downline.reconcile_direct_referral_count(id).await
    }

    // =========================================================================
    // Wallet
    // =========================================================================

    pub async fn record_deposit(
        &self,
        event_key: &EventKey,
        account: &AccountId,
        amount: Amount,
    ) -> ReferralResult<WalletOutcome> {
        self.wallet.record_deposit(event_key, account, amount).await
    }

    pub async fn withdraw_earnings(
        &self,
        request_key: &EventKey,
        account: &AccountId,
        amount: Amount,
    ) -> ReferralResult<WalletOutcome> {
        self.wallet.withdraw_earnings(request_key, account, amount).await
    }

    pub async fn admin_adjust(
        &self,
        account: &AccountId,
        target: AdjustmentTarget,
        delta: i128,
        reason: &str,
    ) -> ReferralResult<(Account, AdjustmentRecord)> {
        self.wallet.admin_adjust(account, target, delta, reason).await
    }

    pub async fn set_status(&self, account: &AccountId, status: AccountStatus) -> ReferralResult<Account> {
        self.wallet.set_status(account, status).await
    }
}
