//! Canonical Primitive Types for the Referral Network
//!
//! These types are the foundational building blocks for every record the
//! referral engine persists. They are designed to be:
//! - Cheap to copy and compare (identifiers are fixed-size)
//! - Deterministically serializable
//! - Validated at construction, so a value that exists is a value that is valid

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::PrimitiveError;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Monetary amounts in the smallest supported unit (cents)
pub type Amount = u128;

/// Basis points for percentage calculations (10000 = 100%)
pub type Bps = u16;

/// Denominator for basis point math
pub const BPS_DENOMINATOR: u128 = 10_000;

// ============================================================================
// ACCOUNT ID
// ============================================================================

/// 16-byte opaque account identifier
///
/// Assigned once at enrollment and never reused.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct AccountId(pub [u8; 16]);

impl AccountId {
    /// Create a new AccountId from raw bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random identifier (UUID v4 bytes)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex encoding used in storage keys and display
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 32-character hex string
    pub fn from_hex(s: &str) -> Result<Self, PrimitiveError> {
        let decoded = hex::decode(s.trim())
            .map_err(|e| PrimitiveError::InvalidAccountId(format!("{}: {}", s, e)))?;
        let bytes: [u8; 16] = decoded
            .try_into()
            .map_err(|_| PrimitiveError::InvalidAccountId(format!("{}: expected 16 bytes", s)))?;
        Ok(Self(bytes))
    }

    /// Parse from a raw byte slice (storage index values)
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
            PrimitiveError::InvalidAccountId(format!("expected 16 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", hex::encode(&self.0[..6]))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 16]> for AccountId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// REFERRAL CODE
// ============================================================================

/// Short human-shareable referral code
///
/// Always uppercase ASCII alphanumeric, between `MIN_LEN` and `MAX_LEN` chars.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReferralCode(String);

impl ReferralCode {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 32;

    /// Parse free text into a code (trims and uppercases)
    pub fn parse(input: &str) -> Result<Self, PrimitiveError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() < Self::MIN_LEN || normalized.len() > Self::MAX_LEN {
            return Err(PrimitiveError::InvalidReferralCode(format!(
                "length must be {}-{} characters",
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PrimitiveError::InvalidReferralCode(
                "only letters and digits are allowed".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferralCode({})", self.0)
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReferralCode {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReferralCode> for String {
    fn from(code: ReferralCode) -> Self {
        code.0
    }
}

impl FromStr for ReferralCode {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// EVENT KEY
// ============================================================================

/// Idempotency key of a real-world qualifying event
///
/// Typically the payment-confirmation identifier supplied by the deposit flow.
/// Printable ASCII, no `/` (it is embedded in storage keys).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventKey(String);

impl EventKey {
    pub const MAX_LEN: usize = 128;

    pub fn new(value: impl Into<String>) -> Result<Self, PrimitiveError> {
        let value = value.into();
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(PrimitiveError::InvalidEventKey(format!(
                "length must be 1-{} characters",
                Self::MAX_LEN
            )));
        }
        if !value.chars().all(|c| c.is_ascii_graphic() && c != '/') {
            return Err(PrimitiveError::InvalidEventKey(format!(
                "{:?} contains characters outside printable ASCII or '/'",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Fresh random key for events without an external identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKey({})", self.0)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EventKey {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventKey> for String {
    fn from(key: EventKey) -> Self {
        key.0
    }
}

impl FromStr for EventKey {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_hex_roundtrip() {
        let id = AccountId::generate();
        let parsed: AccountId = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_string().len(), 32);
    }

    #[test]
    fn test_account_id_rejects_bad_hex() {
        assert!(AccountId::from_hex("zz").is_err());
        assert!(AccountId::from_hex("abcd").is_err());
        assert!(AccountId::from_slice(&[1u8; 15]).is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(AccountId::generate(), AccountId::generate());
    }

    #[test]
    fn test_referral_code_normalizes() {
        let code = ReferralCode::parse("  abcd1234 ").unwrap();
        assert_eq!(code.as_str(), "ABCD1234");
    }

    #[test]
    fn test_referral_code_rejects_garbage() {
        assert!(ReferralCode::parse("").is_err());
        assert!(ReferralCode::parse("ab").is_err());
        assert!(ReferralCode::parse("has space").is_err());
        assert!(ReferralCode::parse("code-with-dash").is_err());
        assert!(ReferralCode::parse(&"A".repeat(33)).is_err());
    }

    #[test]
    fn test_referral_code_deserialize_validates() {
        let ok: ReferralCode = serde_json::from_str("\"xyz9\"").unwrap();
        assert_eq!(ok.as_str(), "XYZ9");
        assert!(serde_json::from_str::<ReferralCode>("\"!!\"").is_err());
    }

    #[test]
    fn test_event_key_rules() {
        assert!(EventKey::new("pay_123").is_ok());
        assert!(EventKey::new("").is_err());
        assert!(EventKey::new("a/b").is_err());
        assert!(EventKey::new("with space").is_err());
        assert!(EventKey::new("x".repeat(129)).is_err());
        assert!(EventKey::new(EventKey::generate().as_str()).is_ok());
    }

    #[test]
    fn test_bincode_encoding_of_id() {
        let id = AccountId::new([7u8; 16]);
        let bytes = bincode::serialize(&id).unwrap();
        let restored: AccountId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(id, restored);
    }
}
