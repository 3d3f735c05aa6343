//! Referral Engine Property Tests
//!
//! End-to-end behavior through the public engine API:
//! - Ancestor chain construction and truncation
//! - Commission conservation and idempotency
//! - Downline counting
//! - Persistence on sled

use lib_referral::{
    Account, AccountStatus, AdjustmentTarget, ApplyOutcome, EventKey, NotificationDispatcher,
    ReferralConfig, ReferralEngine, ReferralError, SponsorResolution, MAX_LEVELS,
};
use lib_storage::{MemoryBackend, SledBackend, StorageBackend};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn memory_engine() -> ReferralEngine<MemoryBackend> {
    ReferralEngine::new(
        MemoryBackend::new(),
        ReferralConfig::for_testing(),
        NotificationDispatcher::disabled(),
    )
    .expect("valid config")
}

async fn enroll<B: StorageBackend>(engine: &ReferralEngine<B>, name: &str, sponsor: Option<&Account>) -> Account {
    let email = format!("{}@example.com", name.to_lowercase());
    engine
        .enroll(name, &email, sponsor.map(|s| s.referral_code.as_str()))
        .await
        .expect("enrollment succeeds")
        .account
}

/// Chain of accounts where each sponsors the next: names[0] is the root
async fn enroll_chain<B: StorageBackend>(engine: &ReferralEngine<B>, names: &[&str]) -> Vec<Account> {
    let mut accounts: Vec<Account> = Vec::new();
    for name in names {
        let account = enroll(engine, name, accounts.last()).await;
        accounts.push(account);
    }
    accounts
}

fn event(key: &str) -> EventKey {
    EventKey::new(key).unwrap()
}

// ============================================================================
// Enrollment
// ============================================================================

#[tokio::test]
async fn test_chain_truncates_to_five_nearest_ancestors() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B", "C", "D", "E", "F", "G"]).await;
    let ids: Vec<_> = chain.iter().map(|a| a.id).collect();

    let g = engine.require_account(&ids[6]).await.unwrap();
    assert_eq!(g.ancestors.len(), MAX_LEVELS);
    // [F, E, D, C, B]; A is beyond level 5
    assert_eq!(g.ancestors.as_slice(), &[ids[5], ids[4], ids[3], ids[2], ids[1]]);
    assert!(!g.ancestors.contains(&ids[0]));
}

#[tokio::test]
async fn test_no_sponsor_and_unresolvable_sponsor() {
    let engine = memory_engine();

    let root = engine.enroll("Root", "root@example.com", None).await.unwrap();
    assert_eq!(root.sponsor, SponsorResolution::None);
    assert!(root.account.ancestors.is_empty());

    let empty = engine.enroll("Empty", "empty@example.com", Some("")).await.unwrap();
    assert!(empty.account.ancestors.is_empty());

    let bad = engine
        .enroll("Bad", "bad@example.com", Some("DOESNOTEXIST"))
        .await
        .unwrap();
    assert!(matches!(bad.sponsor, SponsorResolution::Invalid(_)));
    assert!(bad.warning().is_some());
    assert!(bad.account.ancestors.is_empty());

    for account in [&root.account, &empty.account, &bad.account] {
        let outcome = engine.distribute_commission(&account.id, 10_000).await.unwrap();
        assert!(outcome.credits.is_empty());
    }
}

#[tokio::test]
async fn test_referral_codes_are_unique() {
    let engine = memory_engine();
    let mut codes = std::collections::HashSet::new();
    for i in 0..50 {
        let account = engine
            .enroll("User", &format!("user{}@example.com", i), None)
            .await
            .unwrap()
            .account;
        assert!(codes.insert(account.referral_code.clone()));
        let found = engine.find_by_referral_code(&account.referral_code).await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(account.id));
    }
}

// ============================================================================
// Commission
// ============================================================================

#[tokio::test]
async fn test_end_to_end_example() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B", "C"]).await;
    let (a, b, c) = (&chain[0], &chain[1], &chain[2]);

    assert_eq!(b.ancestors.as_slice(), &[a.id]);
    assert_eq!(c.ancestors.as_slice(), &[b.id, a.id]);

    // $100.00 deposit by C
    let outcome = engine.distribute_commission(&c.id, 10_000).await.unwrap();
    let credited: Vec<_> = outcome.credits.iter().map(|cr| (cr.ancestor, cr.level, cr.amount)).collect();
    assert_eq!(credited, vec![(b.id, 1, 500), (a.id, 2, 250)]);

    assert_eq!(engine.require_account(&b.id).await.unwrap().referral_earnings, 500);
    assert_eq!(engine.require_account(&a.id).await.unwrap().referral_earnings, 250);

    let c_after = engine.require_account(&c.id).await.unwrap();
    assert_eq!(c_after.referral_earnings, 0);
    assert_eq!(c_after.balance, 0);
}

#[tokio::test]
async fn test_conservation_for_every_chain_depth() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["L0", "L1", "L2", "L3", "L4", "L5", "L6"]).await;
    let schedule = engine.config().commission.clone();

    for (k, account) in chain.iter().enumerate().take(7) {
        let depth = k.min(MAX_LEVELS);
        let gross: u128 = 16_000;
        let outcome = engine.distribute_commission(&account.id, gross).await.unwrap();

        let rate_sum: u128 = schedule.level_rates_bps[..depth].iter().map(|r| *r as u128).sum();
        let expected = gross * schedule.pool_rate_bps as u128 * rate_sum / 100_000_000;
        assert_eq!(outcome.total_credited(), expected, "depth {}", depth);
        assert!(outcome.total_credited() * 10_000 <= gross * schedule.pool_rate_bps as u128);
    }
}

#[tokio::test]
async fn test_apply_twice_does_not_double_credit() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B", "C"]).await;
    let key = event("payment-confirmation-1");

    let first = engine.apply_commission(&key, &chain[2].id, 10_000).await.unwrap();
    assert!(matches!(first, ApplyOutcome::Applied(_)));
    let second = engine.apply_commission(&key, &chain[2].id, 10_000).await.unwrap();
    assert_eq!(second, ApplyOutcome::AlreadyApplied);

    let repeat = engine
        .distribute_commission_for_event(&key, &chain[2].id, 10_000)
        .await
        .unwrap();
    assert!(repeat.already_applied);

    assert_eq!(engine.require_account(&chain[1].id).await.unwrap().referral_earnings, 500);
    assert_eq!(engine.require_account(&chain[0].id).await.unwrap().referral_earnings, 250);

    let record = engine.commission_record(&key).await.unwrap().unwrap();
    assert_eq!(record.beneficiary, chain[2].id);
    assert_eq!(record.gross_amount, 10_000);
    assert_eq!(record.total_credited(), 750);
}

#[tokio::test]
async fn test_distribution_validation_errors() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B"]).await;

    let zero = engine.distribute_commission(&chain[1].id, 0).await.unwrap_err();
    assert!(matches!(zero, ReferralError::InvalidAmount(_)));
    assert!(zero.is_validation());

    let unknown = engine
        .distribute_commission(&lib_referral::AccountId::generate(), 100)
        .await
        .unwrap_err();
    assert!(matches!(unknown, ReferralError::UnknownAccount(_)));

    assert_eq!(engine.require_account(&chain[0].id).await.unwrap().referral_earnings, 0);
}

#[tokio::test]
async fn test_suspended_ancestor_still_accrues() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B"]).await;
    engine.set_status(&chain[0].id, AccountStatus::Suspended).await.unwrap();

    engine.distribute_commission(&chain[1].id, 10_000).await.unwrap();
    let a = engine.require_account(&chain[0].id).await.unwrap();
    assert_eq!(a.referral_earnings, 500);
    assert_eq!(a.lifetime_earnings, 500);

    let err = engine
        .withdraw_earnings(&event("w-1"), &chain[0].id, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, ReferralError::AccountSuspended(_)));
}

#[tokio::test]
async fn test_withdrawal_keeps_lifetime_earnings() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B"]).await;
    engine.distribute_commission(&chain[1].id, 10_000).await.unwrap();

    engine.withdraw_earnings(&event("w-1"), &chain[0].id, 300).await.unwrap();
    let a = engine.require_account(&chain[0].id).await.unwrap();
    assert_eq!(a.referral_earnings, 200);
    assert_eq!(a.lifetime_earnings, 500);

    let (a, _) = engine
        .admin_adjust(&chain[0].id, AdjustmentTarget::ReferralEarnings, -200, "chargeback")
        .await
        .unwrap();
    assert_eq!(a.referral_earnings, 0);
}

// ============================================================================
// Downline
// ============================================================================

#[tokio::test]
async fn test_downline_counts_n_and_n_times_m() {
    const N: usize = 4;
    const M: usize = 3;

    let engine = memory_engine();
    let root = enroll(&engine, "Root", None).await;
    for i in 0..N {
        let direct = enroll(&engine, &format!("D{}", i), Some(&root)).await;
        for j in 0..M {
            enroll(&engine, &format!("D{}X{}", i, j), Some(&direct)).await;
        }
    }

    let counts = engine.count_downline_levels(&root.id).await.unwrap();
    assert_eq!(counts, [N as u64, (N * M) as u64, 0, 0, 0]);

    let root_after = engine.require_account(&root.id).await.unwrap();
    assert_eq!(root_after.direct_referral_count, N as u64);
    assert_eq!(engine.direct_referrals(&root.id).await.unwrap().len(), N);

    let reconciliation = engine.reconcile_direct_referral_count(&root.id).await.unwrap();
    assert!(!reconciliation.drifted());
}

#[tokio::test]
async fn test_downline_counts_deep_chain_and_leaf() {
    let engine = memory_engine();
    let chain = enroll_chain(&engine, &["A", "B", "C", "D", "E", "F", "G"]).await;

    assert_eq!(engine.count_downline_levels(&chain[0].id).await.unwrap(), [1, 1, 1, 1, 1]);
    assert_eq!(engine.count_downline_levels(&chain[6].id).await.unwrap(), [0; MAX_LEVELS]);

    let counts = engine.downline_counts(&chain[3].id).await.unwrap();
    assert_eq!(counts.as_array(), [1, 1, 1, 0, 0]);
    assert_eq!(counts.total(), 3);

    assert!(matches!(
        engine.count_downline_levels(&lib_referral::AccountId::generate()).await,
        Err(ReferralError::UnknownAccount(_))
    ));
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_sled_engine_survives_reopen() {
    let dir = TempDir::new().expect("temp dir");

    let (a_id, b_id) = {
        let backend = SledBackend::open(dir.path()).unwrap();
        let engine = ReferralEngine::new(
            backend.open_tree("referral").unwrap(),
            ReferralConfig::for_testing(),
            NotificationDispatcher::disabled(),
        )
        .unwrap();

        let chain = enroll_chain(&engine, &["A", "B"]).await;
        engine
            .confirm_qualifying_payment(&event("pay-1"), &chain[1].id, 10_000)
            .await
            .unwrap();
        engine.store().backend().flush().await.unwrap();
        (chain[0].id, chain[1].id)
    };

    let backend = SledBackend::open(dir.path()).unwrap();
    let engine = ReferralEngine::new(
        backend.open_tree("referral").unwrap(),
        ReferralConfig::for_testing(),
        NotificationDispatcher::disabled(),
    )
    .unwrap();

    assert_eq!(engine.require_account(&a_id).await.unwrap().referral_earnings, 500);
    assert_eq!(engine.require_account(&b_id).await.unwrap().balance, 10_000);
    assert_eq!(engine.count_downline_levels(&a_id).await.unwrap(), [1, 0, 0, 0, 0]);

    // Idempotency markers persist too
    let retry = engine
        .confirm_qualifying_payment(&event("pay-1"), &b_id, 10_000)
        .await
        .unwrap();
    assert!(retry.deposit.duplicate);
    assert!(retry.commission.already_applied);
    assert_eq!(engine.require_account(&a_id).await.unwrap().referral_earnings, 500);
}
