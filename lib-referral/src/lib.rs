//! Multi-level referral engine
//!
//! Accounts carry a write-once snapshot of up to five upstream sponsors.
//! Qualifying payments fan a commission pool out over that chain in one
//! atomic, idempotent write; downline sizes are counted from an index
//! written alongside each account.
//!
//! # Example
//!
//! ```no_run
//! use lib_referral::{NotificationDispatcher, ReferralConfig, ReferralEngine};
//! use lib_storage::MemoryBackend;
//!
//! # async fn demo() -> lib_referral::ReferralResult<()> {
//! let engine = ReferralEngine::new(
//!     MemoryBackend::new(),
//!     ReferralConfig::default(),
//!     NotificationDispatcher::disabled(),
//! )?;
//!
//! let a = engine.enroll("Ada", "ada@example.com", None).await?.account;
//! let b = engine.enroll("Bob", "bob@example.com", Some(a.referral_code.as_str())).await?.account;
//!
//! // $100.00 from Bob: Ada earns $5.00
//! let outcome = engine.distribute_commission(&b.id, 10_000).await?;
//! assert_eq!(outcome.total_credited(), 500);
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod commission;
pub mod config;
pub mod downline;
pub mod engine;
pub mod enrollment;
pub mod errors;
pub mod notification;
pub mod referral_code;
pub mod store;
pub mod wallet;

pub use account::{Account, AccountStatus, AncestorChain};
pub use commission::{
    ApplyOutcome, CommissionCredit, CommissionEngine, CommissionRecord, CommissionSchedule,
    DistributionOutcome, MAX_LEVELS,
};
pub use config::{CommissionConfig, EnrollmentConfig, NotificationConfig, ReferralConfig, RetryPolicy};
pub use downline::{DownlineCounts, DownlineService, Reconciliation};
pub use engine::{PaymentOutcome, ReferralEngine};
pub use enrollment::{EnrollmentOutcome, EnrollmentService, NewAccount, SponsorResolution};
pub use errors::{ReferralError, ReferralResult};
pub use notification::{Notification, NotificationDispatcher, NotificationKind, NotificationSink, TracingSink};
pub use store::{AccountStore, UpdateOutcome};
pub use wallet::{AdjustmentRecord, AdjustmentTarget, DepositRecord, WalletOutcome, WalletService, WithdrawalRecord};

// Re-export primitives so callers need only this crate
pub use lib_types::{format_amount, parse_amount, AccountId, Amount, Bps, EventKey, ReferralCode};
