//! Primitive validation errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("Invalid referral code: {0}")]
    InvalidReferralCode(String),

    #[error("Invalid event key: {0}")]
    InvalidEventKey(String),

    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
}
