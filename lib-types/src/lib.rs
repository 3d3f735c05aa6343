//! Referral network primitives.
//! Stable, storage-neutral, behavior-free.
//!
//! Rule: identifiers are validated newtypes, amounts are integer minor units.

pub mod primitives;
pub mod money;
pub mod errors;

pub use primitives::{AccountId, Amount, Bps, EventKey, ReferralCode, BPS_DENOMINATOR};
pub use money::{format_amount, parse_amount, MINOR_UNITS_PER_UNIT};
pub use errors::PrimitiveError;
