//! Commission schedule math
//!
//! Pure functions: no state, no storage, no side effects.
//!
//! A qualifying amount funds a pool of `pool_rate_bps`; level `n` of the
//! ancestor chain receives `level_rates_bps[n-1]` of that pool. Each level's
//! share is computed from the gross amount with a single truncating division,
//! so remainders below one minor unit are discarded and never credited:
//!
//! ```text
//! amount_n = gross * pool_rate_bps * level_rates_bps[n-1] / 10_000^2
//! ```
//!
//! Conservation: sum(amount_n) <= gross * pool_rate_bps / 10_000.

use serde::{Deserialize, Serialize};
use lib_types::{Amount, Bps, BPS_DENOMINATOR};

use crate::errors::{ReferralError, ReferralResult};

/// Maximum depth of the ancestor chain
pub const MAX_LEVELS: usize = 5;

/// Validated pool rate and per-level split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSchedule {
    pool_rate_bps: Bps,
    level_rates_bps: [Bps; MAX_LEVELS],
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            pool_rate_bps: 1_000,
            level_rates_bps: [5_000, 2_500, 1_250, 625, 625],
        }
    }
}

impl CommissionSchedule {
    /// Build a schedule; pool and level sum must each stay within 100%
    pub fn new(pool_rate_bps: Bps, level_rates_bps: [Bps; MAX_LEVELS]) -> ReferralResult<Self> {
        if pool_rate_bps as u128 > BPS_DENOMINATOR {
            return Err(ReferralError::Config(format!(
                "pool rate {} bps exceeds 10000",
                pool_rate_bps
            )));
        }
        let level_sum: u128 = level_rates_bps.iter().map(|r| *r as u128).sum();
        if level_sum > BPS_DENOMINATOR {
            return Err(ReferralError::Config(format!(
                "level rates sum to {} bps, exceeding 10000",
                level_sum
            )));
        }
        Ok(Self { pool_rate_bps, level_rates_bps })
    }

    pub fn pool_rate_bps(&self) -> Bps {
        self.pool_rate_bps
    }

    pub fn level_rates_bps(&self) -> &[Bps; MAX_LEVELS] {
        &self.level_rates_bps
    }

    /// Whole pool for a gross amount (truncated)
    pub fn pool_amount(&self, gross: Amount) -> ReferralResult<Amount> {
        gross
            .checked_mul(self.pool_rate_bps as Amount)
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or(ReferralError::Overflow)
    }

    /// Commission owed to the ancestor at `level` (1-based)
    pub fn level_amount(&self, gross: Amount, level: usize) -> ReferralResult<Amount> {
        let rate = match level.checked_sub(1).and_then(|i| self.level_rates_bps.get(i)) {
            Some(rate) => *rate as Amount,
            None => return Ok(0),
        };

        gross
            .checked_mul(self.pool_rate_bps as Amount)
            .and_then(|v| v.checked_mul(rate))
            .map(|v| v / (BPS_DENOMINATOR * BPS_DENOMINATOR))
            .ok_or(ReferralError::Overflow)
    }

    /// Amounts for the first `depth` levels, level 1 first
    pub fn split(&self, gross: Amount, depth: usize) -> ReferralResult<Vec<Amount>> {
        (1..=depth.min(MAX_LEVELS))
            .map(|level| self.level_amount(gross, level))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_for_100_dollars() {
        let schedule = CommissionSchedule::default();
        // $100.00 = 10_000 cents, pool 10% = $10.00
        assert_eq!(schedule.pool_amount(10_000).unwrap(), 1_000);
        assert_eq!(
            schedule.split(10_000, 5).unwrap(),
            vec![500, 250, 125, 62, 62]
        );
    }

    #[test]
    fn test_split_respects_depth() {
        let schedule = CommissionSchedule::default();
        assert!(schedule.split(10_000, 0).unwrap().is_empty());
        assert_eq!(schedule.split(10_000, 2).unwrap(), vec![500, 250]);
        assert_eq!(schedule.split(10_000, 9).unwrap().len(), MAX_LEVELS);
    }

    #[test]
    fn test_conservation_never_exceeds_pool() {
        let schedule = CommissionSchedule::default();
        for gross in [1u128, 7, 99, 101, 12_345, 999_999, 10_000_000_007] {
            let total: Amount = schedule.split(gross, MAX_LEVELS).unwrap().iter().sum();
            assert!(total <= schedule.pool_amount(gross).unwrap() || total == 0);
            assert!(total * BPS_DENOMINATOR <= gross * schedule.pool_rate_bps() as Amount);
        }
    }

    #[test]
    fn test_exact_conservation_for_divisible_amounts() {
        let schedule = CommissionSchedule::default();
        // 16_000 cents: pool 1_600, levels 800/400/200/100/100
        for depth in 0..=MAX_LEVELS {
            let total: Amount = schedule.split(16_000, depth).unwrap().iter().sum();
            let rate_sum: Amount = schedule.level_rates_bps()[..depth]
                .iter()
                .map(|r| *r as Amount)
                .sum();
            assert_eq!(total, 16_000 * 1_000 * rate_sum / (BPS_DENOMINATOR * BPS_DENOMINATOR));
        }
    }

    #[test]
    fn test_sub_cent_remainders_are_discarded() {
        let schedule = CommissionSchedule::default();
        // 1 cent gross: every level rounds down to zero
        assert_eq!(schedule.split(1, 5).unwrap(), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_invalid_schedules() {
        assert!(CommissionSchedule::new(10_001, [0; MAX_LEVELS]).is_err());
        assert!(CommissionSchedule::new(1_000, [5_000, 5_000, 1, 0, 0]).is_err());
        assert!(CommissionSchedule::new(10_000, [10_000, 0, 0, 0, 0]).is_ok());
    }

    #[test]
    fn test_overflow_is_reported() {
        let schedule = CommissionSchedule::default();
        assert!(matches!(
            schedule.level_amount(Amount::MAX, 1),
            Err(ReferralError::Overflow)
        ));
        assert_eq!(schedule.level_amount(10_000, 6).unwrap(), 0);
    }
}
