//! Referral Engine Errors

use thiserror::Error;
use lib_storage::StorageError;
use lib_types::{AccountId, Amount, PrimitiveError};

/// Error during referral operations
#[derive(Error, Debug)]
pub enum ReferralError {
    // Validation errors: rejected synchronously, nothing written
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Email already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("Account {0} is suspended")]
    AccountSuspended(AccountId),

    #[error("Insufficient referral earnings: available {available}, requested {requested}")]
    InsufficientEarnings { available: Amount, requested: Amount },

    #[error("Adjustment would make {field} negative: current {current}, delta {delta}")]
    NegativeResult { field: &'static str, current: Amount, delta: i128 },

    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Event key {key} was already used for a different {operation}")]
    EventKeyConflict { key: String, operation: &'static str },

    #[error("Invalid primitive: {0}")]
    Primitive(#[from] PrimitiveError),

    #[error("Invalid ancestor chain: {0}")]
    InvalidChain(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Integrity errors
    #[error("Ancestor {ancestor} of account {account} is missing from the store")]
    MissingAncestor { account: AccountId, ancestor: AccountId },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Could not generate a unique referral code after {attempts} attempts")]
    ReferralCodeExhausted { attempts: u32 },

    // Transient errors
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    RetriesExhausted { operation: &'static str, attempts: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ReferralError {
    /// Errors caused by caller input; retrying without fixing the input is pointless
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReferralError::InvalidAmount(_)
                | ReferralError::UnknownAccount(_)
                | ReferralError::InvalidProfile(_)
                | ReferralError::EmailAlreadyRegistered(_)
                | ReferralError::AccountSuspended(_)
                | ReferralError::InsufficientEarnings { .. }
                | ReferralError::NegativeResult { .. }
                | ReferralError::InvalidAdjustment(_)
                | ReferralError::EventKeyConflict { .. }
                | ReferralError::Primitive(_)
        )
    }

    /// Optimistic-concurrency conflict from the store
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReferralError::Storage(e) if e.is_conflict())
    }
}

impl From<bincode::Error> for ReferralError {
    fn from(e: bincode::Error) -> Self {
        ReferralError::Serialization(e.to_string())
    }
}

/// Result type for referral operations
pub type ReferralResult<T> = Result<T, ReferralError>;
