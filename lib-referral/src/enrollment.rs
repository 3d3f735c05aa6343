//! Enrollment Service
//!
//! Creates accounts and attaches them to their sponsor's ancestor chain.
//! A bad sponsor code never blocks enrollment: the account is created as
//! a root and the caller gets a warning to display.

use tracing::{info, warn};
use lib_storage::StorageBackend;
use lib_types::{AccountId, ReferralCode};

use crate::account::{Account, AncestorChain};
use crate::config::{EnrollmentConfig, RetryPolicy};
use crate::errors::{ReferralError, ReferralResult};
use crate::notification::{Notification, NotificationDispatcher};
use crate::referral_code::generate_code;
use crate::store::AccountStore;

pub const MAX_FULL_NAME_LEN: usize = 120;
pub const MAX_EMAIL_LEN: usize = 200;

/// Profile fields supplied at signup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
}

impl NewAccount {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
        }
    }

    /// Trimmed name and lowercase email, or `InvalidProfile`
    fn normalized(&self) -> ReferralResult<(String, String)> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err(ReferralError::InvalidProfile("full name is required".into()));
        }
        if name.chars().count() > MAX_FULL_NAME_LEN {
            return Err(ReferralError::InvalidProfile(format!(
                "full name exceeds {} characters",
                MAX_FULL_NAME_LEN
            )));
        }

        let email = normalize_email(&self.email)?;
        Ok((name.to_string(), email))
    }
}

/// Lowercase and validate an email address
pub fn normalize_email(raw: &str) -> ReferralResult<String> {
    let email = raw.trim().to_lowercase();
    let invalid = |reason: &str| ReferralError::InvalidProfile(format!("email {:?} {}", raw, reason));

    if email.len() > MAX_EMAIL_LEN {
        return Err(invalid("is too long"));
    }
    if email.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(invalid("contains invalid characters"));
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err(invalid("is missing '@'")),
    };
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("is malformed"));
    }
    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(invalid("has an invalid domain"));
    }

    Ok(email)
}

/// How the sponsor code presented at signup was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsorResolution {
    /// No code was given
    None,
    Resolved(AccountId),
    /// Code was given but matched no account (or was malformed)
    Invalid(String),
}

impl SponsorResolution {
    pub fn sponsor(&self) -> Option<AccountId> {
        match self {
            SponsorResolution::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    /// Display-only warning for the caller
    pub fn warning(&self) -> Option<String> {
        match self {
            SponsorResolution::Invalid(code) => Some(format!(
                "Referral code {:?} is not valid; account created without a sponsor",
                code
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentOutcome {
    pub account: Account,
    pub sponsor: SponsorResolution,
}

impl EnrollmentOutcome {
    pub fn warning(&self) -> Option<String> {
        self.sponsor.warning()
    }
}

pub struct EnrollmentService<B> {
    store: AccountStore<B>,
    config: EnrollmentConfig,
    retry: RetryPolicy,
    notifier: NotificationDispatcher,
}

impl<B: StorageBackend> EnrollmentService<B> {
    pub fn new(
        store: AccountStore<B>,
        config: EnrollmentConfig,
        retry: RetryPolicy,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { store, config, retry, notifier }
    }

    /// Create an account, optionally under the owner of `sponsor_code`
    ///
    /// # Errors
    ///
    /// - `InvalidProfile` for a missing name or malformed email
    /// - `EmailAlreadyRegistered` if the email is taken
    /// - `ReferralCodeExhausted` if no unused code was found
    ///
    /// An unknown sponsor code is not an error; see [`SponsorResolution`].
    pub async fn enroll(&self, profile: NewAccount, sponsor_code: Option<&str>) -> ReferralResult<EnrollmentOutcome> {
        let (full_name, email) = profile.normalized()?;
        if self.store.email_exists(&email).await? {
            return Err(ReferralError::EmailAlreadyRegistered(email));
        }

        let (resolution, sponsor) = self.resolve_sponsor(sponsor_code).await?;
        let ancestors = match &sponsor {
            Some(s) => AncestorChain::sponsored_by(s.id, &s.ancestors),
            None => AncestorChain::root(),
        };
        let sponsor_code = sponsor.as_ref().map(|s| s.referral_code.clone());

        let account = self
            .create_with_unique_code(full_name, email, sponsor_code, ancestors)
            .await?;

        info!(
            "Enrolled account {} with code {} ({} ancestors)",
            account.id,
            account.referral_code,
            account.ancestors.len()
        );

        if let Some(sponsor) = sponsor {
            self.record_direct_referral(&sponsor.id, &account.id).await;
        }

        Ok(EnrollmentOutcome { account, sponsor: resolution })
    }

    async fn resolve_sponsor(&self, raw: Option<&str>) -> ReferralResult<(SponsorResolution, Option<Account>)> {
        let raw = match raw.map(str::trim) {
            Some(code) if !code.is_empty() => code,
            _ => return Ok((SponsorResolution::None, None)),
        };

        let found = match ReferralCode::parse(raw) {
            Ok(code) => self.store.find_by_referral_code(&code).await?,
            Err(_) => None,
        };

        match found {
            Some(sponsor) => Ok((SponsorResolution::Resolved(sponsor.id), Some(sponsor))),
            None => {
                warn!("Sponsor code {:?} did not resolve; enrolling without sponsor", raw);
                Ok((SponsorResolution::Invalid(raw.to_string()), None))
            }
        }
    }

    async fn create_with_unique_code(
        &self,
        full_name: String,
        email: String,
        sponsor_code: Option<ReferralCode>,
        ancestors: AncestorChain,
    ) -> ReferralResult<Account> {
        let attempts = self.config.code_generation_attempts;

        for _ in 0..attempts {
            let code = generate_code(&mut rand::thread_rng(), self.config.referral_code_length)?;
            if self.store.referral_code_exists(&code).await? {
                continue;
            }

            let account = Account::new(
                AccountId::generate(),
                full_name.clone(),
                email.clone(),
                code,
                sponsor_code.clone(),
                ancestors.clone(),
            );

            match self.store.insert_new(&account).await {
                Ok(()) => return Ok(account),
                Err(e) if e.is_conflict() => {
                    // Lost a race on the email or the code
                    if self.store.email_exists(&email).await? {
                        return Err(ReferralError::EmailAlreadyRegistered(email));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ReferralError::ReferralCodeExhausted { attempts })
    }

    /// Best-effort sponsor bookkeeping; failures never undo the enrollment
    async fn record_direct_referral(&self, sponsor: &AccountId, referred: &AccountId) {
        let result = self
            .store
            .update_account(sponsor, None, &self.retry, "direct referral count", |a| {
                a.direct_referral_count = a.direct_referral_count.saturating_add(1);
                Ok(())
            })
            .await;

        if let Err(e) = result {
            warn!("Failed to increment direct referral count of {}: {}", sponsor, e);
        }

        self.notifier.dispatch(Notification::new_referral(*sponsor, *referred));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_storage::MemoryBackend;

    fn service(store: &AccountStore<MemoryBackend>) -> EnrollmentService<MemoryBackend> {
        EnrollmentService::new(
            store.clone(),
            EnrollmentConfig::default(),
            RetryPolicy::default(),
            NotificationDispatcher::disabled(),
        )
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@example", "ada@@example.com", "a b@example.com", "ada@.com"] {
            assert!(normalize_email(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_enroll_without_sponsor() {
        let store = AccountStore::new(MemoryBackend::new());
        let outcome = service(&store)
            .enroll(NewAccount::new("Ada Lovelace", "ada@example.com"), None)
            .await
            .unwrap();

        assert_eq!(outcome.sponsor, SponsorResolution::None);
        assert!(outcome.warning().is_none());
        assert!(outcome.account.ancestors.is_empty());
        assert_eq!(outcome.account.referral_code.as_str().len(), 8);
        assert_eq!(store.require(&outcome.account.id).await.unwrap(), outcome.account);
    }

    #[tokio::test]
    async fn test_enroll_with_sponsor_builds_chain_and_counts() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = service(&store);
        let a = service.enroll(NewAccount::new("A", "a@example.com"), None).await.unwrap().account;
        let b = service
            .enroll(NewAccount::new("B", "b@example.com"), Some(a.referral_code.as_str()))
            .await
            .unwrap();

        assert_eq!(b.sponsor, SponsorResolution::Resolved(a.id));
        assert_eq!(b.account.ancestors.as_slice(), &[a.id]);
        assert_eq!(b.account.sponsor_code, Some(a.referral_code.clone()));
        assert_eq!(store.require(&a.id).await.unwrap().direct_referral_count, 1);
    }

    #[tokio::test]
    async fn test_sponsor_code_lookup_is_case_insensitive() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = service(&store);
        let a = service.enroll(NewAccount::new("A", "a@example.com"), None).await.unwrap().account;
        let lower = a.referral_code.as_str().to_lowercase();

        let b = service
            .enroll(NewAccount::new("B", "b@example.com"), Some(&format!("  {} ", lower)))
            .await
            .unwrap();
        assert_eq!(b.account.ancestors.sponsor(), Some(a.id));
    }

    #[tokio::test]
    async fn test_invalid_sponsor_code_is_non_fatal() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = service(&store);

        for code in ["NOSUCHCODE", "!!", "   "] {
            let email = format!("user{}@example.com", code.len());
            let outcome = service
                .enroll(NewAccount::new("User", email), Some(code))
                .await
                .unwrap();
            assert!(outcome.account.ancestors.is_empty());
            assert!(outcome.account.sponsor_code.is_none());
            if code.trim().is_empty() {
                assert_eq!(outcome.sponsor, SponsorResolution::None);
            } else {
                assert!(outcome.warning().is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_profile_validation() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = service(&store);

        assert!(matches!(
            service.enroll(NewAccount::new("  ", "a@example.com"), None).await,
            Err(ReferralError::InvalidProfile(_))
        ));
        assert!(matches!(
            service.enroll(NewAccount::new("A", "not-an-email"), None).await,
            Err(ReferralError::InvalidProfile(_))
        ));
        assert!(store.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = AccountStore::new(MemoryBackend::new());
        let service = service(&store);
        service.enroll(NewAccount::new("A", "a@example.com"), None).await.unwrap();

        let err = service
            .enroll(NewAccount::new("Other", "A@Example.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralError::EmailAlreadyRegistered(_)));
        assert!(err.is_validation());
        assert_eq!(store.list_accounts().await.unwrap().len(), 1);
    }
}
