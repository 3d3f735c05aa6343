//! Account Types
//!
//! An account is a node in the referral network. Its ancestry is captured
//! once at enrollment as a fixed-width snapshot of upstream sponsors
//! (nearest first), so commission time is a single lookup rather than a walk.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use lib_types::{AccountId, Amount, ReferralCode};

use crate::commission::MAX_LEVELS;
use crate::errors::{ReferralError, ReferralResult};

/// Ordered snapshot of up to five upstream sponsors, nearest first
///
/// # Invariants
///
/// - `len() <= MAX_LEVELS`
/// - no account appears twice
/// - never mutated after the owning account is created
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<AccountId>", into = "Vec<AccountId>")]
pub struct AncestorChain(Vec<AccountId>);

impl AncestorChain {
    /// Chain of an account enrolled without a sponsor
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Chain of an account sponsored by `sponsor`: the sponsor followed by
    /// the sponsor's own chain, truncated to `MAX_LEVELS`
    pub fn sponsored_by(sponsor: AccountId, sponsor_chain: &AncestorChain) -> Self {
        let mut chain = Vec::with_capacity(MAX_LEVELS);
        chain.push(sponsor);
        chain.extend(sponsor_chain.0.iter().copied().take(MAX_LEVELS - 1));
        Self(chain)
    }

    /// Direct sponsor (level 1)
    pub fn sponsor(&self) -> Option<AccountId> {
        self.0.first().copied()
    }

    /// Ancestor at `level` (1-based)
    pub fn at_level(&self, level: usize) -> Option<AccountId> {
        level.checked_sub(1).and_then(|i| self.0.get(i)).copied()
    }

    /// `(level, ancestor)` pairs, level 1 first
    pub fn levels(&self) -> impl Iterator<Item = (usize, AccountId)> + '_ {
        self.0.iter().enumerate().map(|(i, id)| (i + 1, *id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.0.contains(id)
    }

    pub fn as_slice(&self) -> &[AccountId] {
        &self.0
    }
}

impl TryFrom<Vec<AccountId>> for AncestorChain {
    type Error = ReferralError;

    fn try_from(ids: Vec<AccountId>) -> ReferralResult<Self> {
        if ids.len() > MAX_LEVELS {
            return Err(ReferralError::InvalidChain(format!(
                "{} ancestors exceeds the maximum of {}",
                ids.len(),
                MAX_LEVELS
            )));
        }
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(ReferralError::InvalidChain(format!("{} appears twice", id)));
            }
        }
        Ok(Self(ids))
    }
}

impl From<AncestorChain> for Vec<AccountId> {
    fn from(chain: AncestorChain) -> Self {
        chain.0
    }
}

/// Account lifecycle status; accounts are suspended, never deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Suspended => f.write_str("suspended"),
        }
    }
}

/// Persisted account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Immutable identifier
    pub id: AccountId,
    pub full_name: String,
    /// Normalized (lowercase) email, unique
    pub email: String,
    /// Own shareable code, unique and immutable
    pub referral_code: ReferralCode,
    /// Code presented at signup, only kept when it resolved to a sponsor
    pub sponsor_code: Option<ReferralCode>,
    /// Write-once upstream snapshot
    pub ancestors: AncestorChain,
    /// Spendable platform balance
    pub balance: Amount,
    /// Withdrawable commission earnings
    pub referral_earnings: Amount,
    /// Every commission ever credited, unaffected by withdrawals
    pub lifetime_earnings: Amount,
    /// Denormalized count of accounts whose level-1 ancestor is this account
    pub direct_referral_count: u64,
    pub status: AccountStatus,
    /// Unix seconds
    pub created_at: u64,
}

impl Account {
    /// Fresh account record with zeroed ledgers
    pub fn new(
        id: AccountId,
        full_name: String,
        email: String,
        referral_code: ReferralCode,
        sponsor_code: Option<ReferralCode>,
        ancestors: AncestorChain,
    ) -> Self {
        Self {
            id,
            full_name,
            email,
            referral_code,
            sponsor_code,
            ancestors,
            balance: 0,
            referral_earnings: 0,
            lifetime_earnings: 0,
            direct_referral_count: 0,
            status: AccountStatus::Active,
            created_at: unix_now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Credit a commission to this account's earnings
    pub(crate) fn credit_commission(&mut self, amount: Amount) -> ReferralResult<()> {
        self.referral_earnings = self
            .referral_earnings
            .checked_add(amount)
            .ok_or(ReferralError::Overflow)?;
        self.lifetime_earnings = self
            .lifetime_earnings
            .checked_add(amount)
            .ok_or(ReferralError::Overflow)?;
        Ok(())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
