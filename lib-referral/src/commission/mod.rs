//! Commission distribution
//!
//! - `schedule`: pure per-level split math
//! - `engine`: atomic, idempotent fan-out over the account store

pub mod engine;
pub mod schedule;

pub use engine::{ApplyOutcome, CommissionCredit, CommissionEngine, CommissionRecord, DistributionOutcome};
pub use schedule::{CommissionSchedule, MAX_LEVELS};
