use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::users::forms::RegisterForm;

/// Why an OTP verification attempt failed. Each reason is user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no pending registration for this email")]
    NotFound,
    #[error("verification code expired")]
    Expired,
    #[error("invalid verification code")]
    Mismatch,
}

/// Everything held for an email that is mid-registration.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRegistration {
    pub code: String,
    pub form: RegisterForm,
    pub profile_pic: Option<String>,
    pub expires_at: OffsetDateTime,
}

/// In-process store of pending registrations, keyed by lowercased email.
/// At most one record per email; a new `put` overwrites the previous one.
/// State is lost on restart, which silently invalidates pending
/// registrations (accepted tradeoff for a single-instance deployment).
pub struct OtpRegistry {
    entries: DashMap<String, PendingRegistration>,
    ttl: Duration,
}

impl OtpRegistry {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Uniformly random 6-digit code, as text so leading zeros survive.
    pub fn generate() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }

    pub fn put(
        &self,
        email: &str,
        code: String,
        form: RegisterForm,
        profile_pic: Option<String>,
    ) {
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        self.entries.insert(
            email.to_string(),
            PendingRegistration {
                code,
                form,
                profile_pic,
                expires_at,
            },
        );
        debug!(email = %email, "pending registration stored");
    }

    /// Single-use verification. The occupied-entry lock makes the
    /// check-and-evict atomic per email, so two concurrent attempts against
    /// the same record cannot both succeed. An expired record is evicted on
    /// sight; a mismatched code leaves it in place for another attempt.
    pub fn verify(&self, email: &str, code: &str) -> Result<PendingRegistration, OtpError> {
        match self.entries.entry(email.to_string()) {
            Entry::Vacant(_) => Err(OtpError::NotFound),
            Entry::Occupied(entry) => {
                if OffsetDateTime::now_utc() > entry.get().expires_at {
                    entry.remove();
                    return Err(OtpError::Expired);
                }
                if entry.get().code != code {
                    return Err(OtpError::Mismatch);
                }
                Ok(entry.remove())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    fn form(email: &str) -> RegisterForm {
        RegisterForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: "longenough".into(),
            mobile_number: None,
            role: Role::User,
        }
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = OtpRegistry::generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verify_consumes_the_record() {
        let registry = OtpRegistry::new(10);
        registry.put("a@x.com", "123456".into(), form("a@x.com"), None);

        let pending = registry.verify("a@x.com", "123456").unwrap();
        assert_eq!(pending.form.email, "a@x.com");

        // Single use: the record is gone.
        assert_eq!(registry.verify("a@x.com", "123456"), Err(OtpError::NotFound));
    }

    #[test]
    fn mismatch_keeps_the_record_for_another_attempt() {
        let registry = OtpRegistry::new(10);
        registry.put("a@x.com", "123456".into(), form("a@x.com"), None);

        assert_eq!(registry.verify("a@x.com", "000000"), Err(OtpError::Mismatch));
        assert!(registry.verify("a@x.com", "123456").is_ok());
    }

    #[test]
    fn expired_record_is_evicted_on_verify() {
        let registry = OtpRegistry::new(-1);
        registry.put("a@x.com", "123456".into(), form("a@x.com"), None);

        assert_eq!(registry.verify("a@x.com", "123456"), Err(OtpError::Expired));
        // Evicted: a second attempt no longer finds it.
        assert_eq!(registry.verify("a@x.com", "123456"), Err(OtpError::NotFound));
    }

    #[test]
    fn resubmission_overwrites_the_previous_code() {
        let registry = OtpRegistry::new(10);
        registry.put("a@x.com", "111111".into(), form("a@x.com"), None);
        registry.put("a@x.com", "222222".into(), form("a@x.com"), None);

        assert_eq!(registry.verify("a@x.com", "111111"), Err(OtpError::Mismatch));
        assert!(registry.verify("a@x.com", "222222").is_ok());
    }

    #[test]
    fn unknown_email_is_not_found() {
        let registry = OtpRegistry::new(10);
        assert_eq!(registry.verify("nobody@x.com", "123456"), Err(OtpError::NotFound));
    }
}
