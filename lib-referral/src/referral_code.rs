//! Referral code generation

use rand::Rng;
use lib_types::ReferralCode;

use crate::errors::ReferralResult;

/// Uppercase alphanumerics without the look-alikes 0/O and 1/I
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Random code of `length` characters drawn from [`CODE_ALPHABET`]
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> ReferralResult<ReferralCode> {
    let raw: String = (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    Ok(ReferralCode::parse(&raw)?)
}
