//! Models that represent server-side authenticators bound to an identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
/// Supported authenticator types. Each identifier binds at most one
/// authenticator per type.
pub enum AuthenticatorType {
    #[default]
    Password,
    PkiCert,
    HardwareToken,
    ApiKey,
}

impl AuthenticatorType {
    /// Returns the canonical snake_case representation of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticatorType::Password => "password",
            AuthenticatorType::PkiCert => "pki_cert",
            AuthenticatorType::HardwareToken => "hardware_token",
            AuthenticatorType::ApiKey => "api_key",
        }
    }
}

impl std::fmt::Display for AuthenticatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
/// Stored lifecycle status of an authenticator.
pub enum AuthenticatorStatus {
    #[default]
    Active,
    Expired,
    Revoked,
    Locked,
}

impl AuthenticatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticatorStatus::Active => "active",
            AuthenticatorStatus::Expired => "expired",
            AuthenticatorStatus::Revoked => "revoked",
            AuthenticatorStatus::Locked => "locked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Type-specific payload carried alongside the common authenticator header.
pub enum AuthenticatorKind {
    Password {
        /// Adaptive hash of the password; plaintext is never stored.
        password_hash: String,
        /// Failed attempts counted inside the current lockout window.
        failed_attempts: u32,
        /// Lockout expiry; the authenticator behaves as locked until it passes.
        locked_until: Option<DateTime<Utc>>,
        /// How many times this authenticator has been locked since the last
        /// successful validation, used for backoff escalation.
        lockout_count: u32,
    },
    PkiCert {
        subject_dn: String,
        serial_number: String,
        /// SHA-256 digest over the encoded certificate, hex encoded.
        certificate_fingerprint: String,
    },
    HardwareToken {
        token_reference: String,
    },
    ApiKey {
        key_hash: String,
    },
}

impl AuthenticatorKind {
    pub fn authenticator_type(&self) -> AuthenticatorType {
        match self {
            AuthenticatorKind::Password { .. } => AuthenticatorType::Password,
            AuthenticatorKind::PkiCert { .. } => AuthenticatorType::PkiCert,
            AuthenticatorKind::HardwareToken { .. } => AuthenticatorType::HardwareToken,
            AuthenticatorKind::ApiKey { .. } => AuthenticatorType::ApiKey,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Server-side record binding an identifier to a verifiable secret.
pub struct Authenticator {
    /// Unique identifier for the authenticator record.
    pub id: String,
    /// The subject this authenticator belongs to.
    pub identifier: String,
    /// Stored lifecycle status.
    pub status: AuthenticatorStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp; never earlier than `created_at`.
    pub updated_at: DateTime<Utc>,
    /// Expiry instant, compared against wall time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Type-specific payload.
    pub kind: AuthenticatorKind,
}

impl Authenticator {
    /// Constructs a new ACTIVE password authenticator.
    pub fn new_password(
        identifier: &str,
        password_hash: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            status: AuthenticatorStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at,
            kind: AuthenticatorKind::Password {
                password_hash,
                failed_attempts: 0,
                locked_until: None,
                lockout_count: 0,
            },
        }
    }

    /// Constructs a new ACTIVE PKI authenticator. Expiry is bound to the
    /// certificate's notAfter instant.
    pub fn new_pki(
        identifier: &str,
        subject_dn: String,
        serial_number: String,
        certificate_fingerprint: String,
        not_after: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            identifier: identifier.to_string(),
            status: AuthenticatorStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: Some(not_after),
            kind: AuthenticatorKind::PkiCert {
                subject_dn,
                serial_number,
                certificate_fingerprint,
            },
        }
    }

    pub fn authenticator_type(&self) -> AuthenticatorType {
        self.kind.authenticator_type()
    }

    /// Returns `true` when wall time has passed `expires_at`, or the stored
    /// status already says EXPIRED.
    pub fn is_expired(&self) -> bool {
        if self.status == AuthenticatorStatus::Expired {
            return true;
        }
        self.expires_at.map(|at| Utc::now() > at).unwrap_or(false)
    }

    /// Returns `true` while a lockout timestamp lies in the future, or the
    /// stored status says LOCKED with no elapsed timestamp.
    pub fn is_locked(&self) -> bool {
        match &self.kind {
            AuthenticatorKind::Password { locked_until, .. } => match locked_until {
                Some(until) => Utc::now() < *until,
                None => self.status == AuthenticatorStatus::Locked,
            },
            _ => self.status == AuthenticatorStatus::Locked,
        }
    }

    /// Active ⇔ status is ACTIVE and the record is neither expired nor locked.
    pub fn is_active(&self) -> bool {
        self.status == AuthenticatorStatus::Active && !self.is_expired() && !self.is_locked()
    }

    pub fn password_hash(&self) -> Option<&str> {
        match &self.kind {
            AuthenticatorKind::Password { password_hash, .. } => Some(password_hash),
            _ => None,
        }
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match &self.kind {
            AuthenticatorKind::Password { locked_until, .. } => *locked_until,
            _ => None,
        }
    }

    pub fn certificate_fingerprint(&self) -> Option<&str> {
        match &self.kind {
            AuthenticatorKind::PkiCert {
                certificate_fingerprint,
                ..
            } => Some(certificate_fingerprint),
            _ => None,
        }
    }

    /// Bumps the update timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn password_authenticator() -> Authenticator {
        Authenticator::new_password("alice", "$2b$04$hash".to_string(), None)
    }

    #[test]
    fn new_password_authenticator_starts_active() {
        let auth = password_authenticator();
        assert_eq!(auth.status, AuthenticatorStatus::Active);
        assert!(auth.is_active());
        assert!(!auth.is_expired());
        assert!(!auth.is_locked());
        assert_eq!(auth.authenticator_type(), AuthenticatorType::Password);
        assert!(auth.created_at <= auth.updated_at);
    }

    #[test]
    fn past_expiry_makes_authenticator_inactive() {
        let mut auth = password_authenticator();
        auth.expires_at = Some(Utc::now() - Duration::days(1));
        assert!(auth.is_expired());
        assert!(!auth.is_active());
    }

    #[test]
    fn future_lockout_timestamp_reports_locked() {
        let mut auth = password_authenticator();
        if let AuthenticatorKind::Password { locked_until, .. } = &mut auth.kind {
            *locked_until = Some(Utc::now() + Duration::minutes(15));
        }
        auth.status = AuthenticatorStatus::Locked;
        assert!(auth.is_locked());
        assert!(!auth.is_active());
    }

    #[test]
    fn elapsed_lockout_timestamp_reports_unlocked() {
        let mut auth = password_authenticator();
        if let AuthenticatorKind::Password { locked_until, .. } = &mut auth.kind {
            *locked_until = Some(Utc::now() - Duration::minutes(1));
        }
        assert!(!auth.is_locked());
    }

    #[test]
    fn pki_authenticator_binds_expiry_to_not_after() {
        let not_after = Utc::now() + Duration::days(365);
        let auth = Authenticator::new_pki(
            "alice",
            "CN=alice".into(),
            "01:02:03".into(),
            "ab".repeat(32),
            not_after,
        );
        assert_eq!(auth.expires_at, Some(not_after));
        assert_eq!(auth.authenticator_type(), AuthenticatorType::PkiCert);
    }

    #[test]
    fn authenticator_type_serde_uses_snake_case() {
        let json = serde_json::to_value(AuthenticatorType::PkiCert).unwrap();
        assert_eq!(json, serde_json::Value::String("pki_cert".into()));
        let parsed: AuthenticatorType = serde_json::from_str("\"hardware_token\"").unwrap();
        assert_eq!(parsed, AuthenticatorType::HardwareToken);
    }
}
