//! Authenticator lifecycle management: creation, validation, rotation,
//! revocation, and lockout enforcement.

use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::error::{AuthError, AuthErrorCode};
use crate::models::authenticator::{Authenticator, AuthenticatorStatus, AuthenticatorType};
use crate::models::certificate::Certificate;
use crate::models::credential::Credential;
use crate::models::policy::{LockoutPolicy, PasswordPolicy};
use crate::services::audit_log::{SecurityEvent, SecurityEventLog};
use crate::services::cert_validator::CertificateValidator;
use crate::storage::AuthenticatorStore;
use crate::utils::password::PasswordHasher;
use crate::validation::evaluate_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Verdict of checking a presented credential against the bound
/// authenticator. Rejections carry the boundary code the caller surfaces.
pub enum CredentialVerdict {
    Accepted,
    Rejected(AuthErrorCode),
}

impl CredentialVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CredentialVerdict::Accepted)
    }

    pub fn rejection_code(&self) -> Option<AuthErrorCode> {
        match self {
            CredentialVerdict::Accepted => None,
            CredentialVerdict::Rejected(code) => Some(*code),
        }
    }
}

/// Coordinates authenticator state against storage, the password policy,
/// and the certificate validator. Each identifier binds at most one
/// authenticator per type.
pub struct AuthenticatorManager {
    store: Arc<dyn AuthenticatorStore>,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
    lockout: LockoutPolicy,
    cert_validator: Arc<CertificateValidator>,
    events: Option<Arc<SecurityEventLog>>,
}

impl AuthenticatorManager {
    pub fn new(
        store: Arc<dyn AuthenticatorStore>,
        hasher: Arc<dyn PasswordHasher>,
        policy: PasswordPolicy,
        lockout: LockoutPolicy,
        cert_validator: Arc<CertificateValidator>,
    ) -> Self {
        Self {
            store,
            hasher,
            policy: policy.normalized(),
            lockout,
            cert_validator,
            events: None,
        }
    }

    /// Attaches a security event log; lockouts are recorded to it.
    pub fn with_event_log(mut self, events: Arc<SecurityEventLog>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Registers a new ACTIVE authenticator for the credential's identifier.
    pub fn create(&self, credential: &Credential) -> Result<Authenticator, AuthError> {
        let identifier = non_empty_identifier(credential.identifier())?;
        match credential {
            Credential::Password { secret, .. } => {
                let password = secret
                    .expose_str()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AuthError::InvalidArgument("password must not be empty".into())
                    })?;
                let evaluation = evaluate_password(&self.policy, password);
                if !evaluation.valid {
                    return Err(AuthError::PolicyViolation(evaluation.violations));
                }
                if self
                    .store
                    .find(identifier, AuthenticatorType::Password)?
                    .is_some()
                {
                    return Err(AuthError::Duplicate {
                        identifier: identifier.to_string(),
                    });
                }

                // Hashing is CPU-bound; it happens before any store guard.
                let hash = self.hasher.hash(password)?;
                let expires_at = self.policy.expires_at(Utc::now());
                let authenticator =
                    Authenticator::new_password(identifier, hash.clone(), expires_at);
                self.store.insert(authenticator.clone())?;
                self.store
                    .push_history(identifier, &hash, self.policy.history_size)?;
                self.store.clear_login_failures(identifier)?;
                tracing::debug!(identifier, "password authenticator created");
                Ok(authenticator)
            }
            Credential::Certificate { certificate, .. } => {
                let validation = self.cert_validator.validate(certificate);
                if !validation.valid {
                    return Err(AuthError::PolicyViolation(validation.violations));
                }
                if self
                    .store
                    .find(identifier, AuthenticatorType::PkiCert)?
                    .is_some()
                {
                    return Err(AuthError::Duplicate {
                        identifier: identifier.to_string(),
                    });
                }
                let authenticator = Authenticator::new_pki(
                    identifier,
                    certificate.subject_dn.clone(),
                    certificate.serial_number.clone(),
                    certificate.fingerprint(),
                    certificate.not_after,
                );
                self.store.insert(authenticator.clone())?;
                tracing::debug!(identifier, "pki authenticator created");
                Ok(authenticator)
            }
        }
    }

    /// Checks a presented credential against the bound authenticator under
    /// the active policy.
    pub fn validate(&self, credential: &Credential) -> Result<CredentialVerdict, AuthError> {
        let identifier = non_empty_identifier(credential.identifier())?;
        match credential {
            Credential::Password { secret, .. } => {
                let password = secret
                    .expose_str()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AuthError::InvalidArgument("password must not be empty".into())
                    })?;
                self.validate_password(identifier, password)
            }
            Credential::Certificate { certificate, .. } => {
                self.validate_certificate(identifier, certificate)
            }
        }
    }

    fn validate_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<CredentialVerdict, AuthError> {
        let Some(authenticator) = self.load_password_repaired(identifier)? else {
            return Ok(CredentialVerdict::Rejected(
                AuthErrorCode::AuthenticatorNotFound,
            ));
        };

        if let Some(code) = status_rejection(&authenticator) {
            return Ok(CredentialVerdict::Rejected(code));
        }

        let hash = authenticator
            .password_hash()
            .ok_or_else(|| AuthError::InvalidState("password authenticator without hash".into()))?
            .to_string();

        // Verification runs outside any store guard.
        if self.hasher.verify(password, &hash)? {
            self.store.clear_login_failures(identifier)?;
            Ok(CredentialVerdict::Accepted)
        } else {
            let state = self
                .store
                .record_login_failure(identifier, Utc::now(), self.lockout)?;
            if state.became_locked {
                tracing::warn!(
                    identifier,
                    locked_until = ?state.locked_until,
                    "authenticator locked after repeated failures"
                );
                if let Some(events) = &self.events {
                    events.record(SecurityEvent::AccountLocked {
                        identifier: identifier.to_string(),
                        locked_until: state.locked_until,
                        timestamp: Utc::now(),
                    });
                }
            }
            Ok(CredentialVerdict::Rejected(AuthErrorCode::InvalidPassword))
        }
    }

    fn validate_certificate(
        &self,
        identifier: &str,
        certificate: &Certificate,
    ) -> Result<CredentialVerdict, AuthError> {
        let Some(authenticator) = self.store.find(identifier, AuthenticatorType::PkiCert)? else {
            return Ok(CredentialVerdict::Rejected(
                AuthErrorCode::AuthenticatorNotFound,
            ));
        };

        if let Some(code) = status_rejection(&authenticator) {
            return Ok(CredentialVerdict::Rejected(code));
        }

        let validation = self.cert_validator.validate(certificate);
        if !validation.valid {
            return Ok(CredentialVerdict::Rejected(
                AuthErrorCode::CertificateInvalid,
            ));
        }

        let stored = authenticator.certificate_fingerprint().ok_or_else(|| {
            AuthError::InvalidState("pki authenticator without fingerprint".into())
        })?;
        let presented = certificate.fingerprint();
        if bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
            Ok(CredentialVerdict::Accepted)
        } else {
            Ok(CredentialVerdict::Rejected(
                AuthErrorCode::CertificateInvalid,
            ))
        }
    }

    /// Rotates a credential after validating the old one. A failing old
    /// credential may lock the account through the usual failure path.
    pub fn update(
        &self,
        old: &Credential,
        new: &Credential,
    ) -> Result<Authenticator, AuthError> {
        let identifier = non_empty_identifier(old.identifier())?;
        if old.identifier() != new.identifier() {
            return Err(AuthError::InvalidArgument(
                "old and new credentials must share one identifier".into(),
            ));
        }
        if old.factor_type() != new.factor_type() {
            return Err(AuthError::CredentialRejected(
                AuthErrorCode::InvalidCredentialType,
            ));
        }

        let verdict = self.validate(old)?;
        if let Some(code) = verdict.rejection_code() {
            return Err(AuthError::CredentialRejected(code));
        }

        match new {
            Credential::Password { secret, .. } => {
                let new_password = secret
                    .expose_str()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AuthError::InvalidArgument("password must not be empty".into())
                    })?;
                self.commit_password_rotation(identifier, new_password)
            }
            Credential::Certificate { certificate, .. } => {
                self.commit_certificate_rotation(identifier, certificate)
            }
        }
    }

    fn commit_password_rotation(
        &self,
        identifier: &str,
        new_password: &str,
    ) -> Result<Authenticator, AuthError> {
        let evaluation = evaluate_password(&self.policy, new_password);
        if !evaluation.valid {
            return Err(AuthError::PolicyViolation(evaluation.violations));
        }

        // Any retained hash the candidate verifies against rejects reuse.
        // Entries that no longer parse simply fail to match.
        let history = self
            .store
            .password_history(identifier, self.policy.history_size)?;
        for retained in &history {
            if self.hasher.verify(new_password, retained)? {
                return Err(AuthError::PasswordReuse);
            }
        }

        let new_hash = self.hasher.hash(new_password)?;
        let expires_at = self.policy.expires_at(Utc::now());
        let authenticator = self.store.update_password(
            identifier,
            &new_hash,
            expires_at,
            self.policy.history_size,
        )?;
        tracing::debug!(identifier, "password rotated");
        Ok(authenticator)
    }

    fn commit_certificate_rotation(
        &self,
        identifier: &str,
        certificate: &Certificate,
    ) -> Result<Authenticator, AuthError> {
        let validation = self.cert_validator.validate(certificate);
        if !validation.valid {
            return Err(AuthError::PolicyViolation(validation.violations));
        }
        let mut authenticator = self
            .store
            .find(identifier, AuthenticatorType::PkiCert)?
            .ok_or_else(|| AuthError::NotFound {
                identifier: identifier.to_string(),
            })?;
        authenticator.kind = crate::models::authenticator::AuthenticatorKind::PkiCert {
            subject_dn: certificate.subject_dn.clone(),
            serial_number: certificate.serial_number.clone(),
            certificate_fingerprint: certificate.fingerprint(),
        };
        authenticator.status = AuthenticatorStatus::Active;
        authenticator.expires_at = Some(certificate.not_after);
        authenticator.touch(Utc::now());
        self.store.save(authenticator.clone())?;
        tracing::debug!(identifier, "certificate rotated");
        Ok(authenticator)
    }

    /// Marks the authenticator REVOKED. Revocation is never undone by the
    /// manager.
    pub fn revoke(&self, identifier: &str, kind: AuthenticatorType) -> Result<(), AuthError> {
        self.transition_status(identifier, kind, AuthenticatorStatus::Revoked)
    }

    /// Marks the authenticator EXPIRED, making it eligible for renewal.
    pub fn expire(&self, identifier: &str, kind: AuthenticatorType) -> Result<(), AuthError> {
        self.transition_status(identifier, kind, AuthenticatorStatus::Expired)
    }

    fn transition_status(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
        status: AuthenticatorStatus,
    ) -> Result<(), AuthError> {
        let identifier = non_empty_identifier(identifier)?;
        let mut authenticator =
            self.store
                .find(identifier, kind)?
                .ok_or_else(|| AuthError::NotFound {
                    identifier: identifier.to_string(),
                })?;
        authenticator.status = status;
        authenticator.touch(Utc::now());
        self.store.save(authenticator)?;
        tracing::debug!(identifier, kind = %kind, status = status.as_str(), "authenticator status changed");
        Ok(())
    }

    /// Replaces an EXPIRED authenticator with a fresh credential, applying
    /// update semantics for policy and history.
    pub fn renew(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
        credential: &Credential,
    ) -> Result<Authenticator, AuthError> {
        let identifier = non_empty_identifier(identifier)?;
        let current = self
            .store
            .find(identifier, kind)?
            .ok_or_else(|| AuthError::NotFound {
                identifier: identifier.to_string(),
            })?;
        if !current.is_expired() {
            return Err(AuthError::InvalidState(
                "only an expired authenticator can be renewed".into(),
            ));
        }

        match credential {
            Credential::Password { secret, .. } if kind == AuthenticatorType::Password => {
                let password = secret
                    .expose_str()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AuthError::InvalidArgument("password must not be empty".into())
                    })?;
                self.commit_password_rotation(identifier, password)
            }
            Credential::Certificate { certificate, .. } if kind == AuthenticatorType::PkiCert => {
                self.commit_certificate_rotation(identifier, certificate)
            }
            _ => Err(AuthError::CredentialRejected(
                AuthErrorCode::InvalidCredentialType,
            )),
        }
    }

    /// All authenticators bound to the identifier, ordered by type.
    pub fn list(&self, identifier: &str) -> Result<Vec<Authenticator>, AuthError> {
        let identifier = non_empty_identifier(identifier)?;
        Ok(self.store.list(identifier)?)
    }

    /// Fetches one authenticator, repairing an elapsed lockout on read.
    pub fn get(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> Result<Option<Authenticator>, AuthError> {
        let identifier = non_empty_identifier(identifier)?;
        if kind == AuthenticatorType::Password {
            self.load_password_repaired(identifier)
        } else {
            Ok(self.store.find(identifier, kind)?)
        }
    }

    /// Whether the authenticator is expired, by status or wall clock.
    pub fn is_expired(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> Result<bool, AuthError> {
        let identifier = non_empty_identifier(identifier)?;
        let authenticator =
            self.store
                .find(identifier, kind)?
                .ok_or_else(|| AuthError::NotFound {
                    identifier: identifier.to_string(),
                })?;
        Ok(authenticator.is_expired())
    }

    fn load_password_repaired(
        &self,
        identifier: &str,
    ) -> Result<Option<Authenticator>, AuthError> {
        let Some(authenticator) = self.store.find(identifier, AuthenticatorType::Password)? else {
            return Ok(None);
        };
        let now = Utc::now();
        if let Some(until) = authenticator.locked_until() {
            if now > until {
                return Ok(self.store.clear_elapsed_lockout(identifier, now)?);
            }
        }
        Ok(Some(authenticator))
    }
}

/// Maps a non-usable stored status to the rejection the caller sees.
fn status_rejection(authenticator: &Authenticator) -> Option<AuthErrorCode> {
    match authenticator.status {
        AuthenticatorStatus::Revoked => Some(AuthErrorCode::AuthenticatorRevoked),
        AuthenticatorStatus::Expired => Some(AuthErrorCode::AuthenticatorExpired),
        AuthenticatorStatus::Locked => Some(AuthErrorCode::AuthenticatorLocked),
        AuthenticatorStatus::Active => {
            if authenticator.is_expired() {
                Some(AuthErrorCode::AuthenticatorExpired)
            } else if authenticator.is_locked() {
                Some(AuthErrorCode::AuthenticatorLocked)
            } else {
                None
            }
        }
    }
}

fn non_empty_identifier(identifier: &str) -> Result<&str, AuthError> {
    if identifier.is_empty() {
        Err(AuthError::InvalidArgument(
            "identifier must not be empty".into(),
        ))
    } else {
        Ok(identifier)
    }
}
