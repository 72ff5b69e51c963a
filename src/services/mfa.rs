//! Multi-factor coordination: dispatches an ordered credential list across
//! the registered providers and checks the satisfied factors against the
//! MFA policy.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::error::{AuthError, AuthErrorCode};
use crate::models::authenticator::AuthenticatorType;
use crate::models::credential::Credential;
use crate::models::policy::MfaPolicy;
use crate::models::principal::{AuthenticationResult, Principal};
use crate::services::providers::AuthenticationProvider;

pub struct MfaCoordinator {
    providers: Vec<Arc<dyn AuthenticationProvider>>,
    policy: MfaPolicy,
}

impl MfaCoordinator {
    /// Builds a coordinator, rejecting structurally invalid policies.
    pub fn new(
        providers: Vec<Arc<dyn AuthenticationProvider>>,
        policy: MfaPolicy,
    ) -> Result<Self, AuthError> {
        policy.validate()?;
        Ok(Self { providers, policy })
    }

    pub fn policy(&self) -> &MfaPolicy {
        &self.policy
    }

    /// Runs the ordered credential list through the providers.
    ///
    /// Constraint order: identifier agreement, factor count (when MFA is
    /// required), provider availability, provider outcomes (first failure is
    /// surfaced unchanged), then policy satisfaction over the set of
    /// satisfied factor types.
    pub fn authenticate(
        &self,
        mut credentials: Vec<Credential>,
    ) -> Result<AuthenticationResult, AuthError> {
        if credentials.is_empty() {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::InsufficientFactors,
                "No credentials were presented",
            ));
        }

        let identifier = credentials[0].identifier().to_string();
        if credentials
            .iter()
            .any(|credential| credential.identifier() != identifier)
        {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::IdentifierMismatch,
                "All credentials must belong to one identifier",
            ));
        }

        if self.policy.mfa_required && credentials.len() < self.policy.minimum_factors {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::InsufficientFactors,
                format!(
                    "At least {} factors are required",
                    self.policy.minimum_factors
                ),
            ));
        }

        let mut satisfied: BTreeSet<AuthenticatorType> = BTreeSet::new();
        let mut first_success: Option<AuthenticationResult> = None;
        for credential in credentials.iter_mut() {
            let Some(provider) = self
                .providers
                .iter()
                .find(|provider| provider.supports(credential))
            else {
                return Ok(AuthenticationResult::failure(
                    AuthErrorCode::UnsupportedCredentialType,
                    format!(
                        "No provider supports '{}' credentials",
                        credential.factor_type()
                    ),
                ));
            };

            let factor = credential.factor_type();
            let result = provider.authenticate(credential)?;
            if !result.is_success() {
                // The failing provider's outcome is surfaced unchanged.
                return Ok(result);
            }
            satisfied.insert(factor);
            if first_success.is_none() {
                first_success = Some(result);
            }
        }

        if let Some(unmet) = self
            .policy
            .required_types
            .iter()
            .find(|required| !satisfied.contains(required))
        {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::PolicyNotSatisfied,
                format!("Required factor type '{}' was not satisfied", unmet),
            ));
        }
        if let Some(disallowed) = satisfied
            .iter()
            .find(|factor| !self.policy.allows(**factor))
        {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::PolicyNotSatisfied,
                format!("Factor type '{}' is not allowed", disallowed),
            ));
        }
        if satisfied.len() < self.policy.minimum_factors {
            return Ok(AuthenticationResult::failure(
                AuthErrorCode::PolicyNotSatisfied,
                format!(
                    "{} distinct factor types satisfied, {} required",
                    satisfied.len(),
                    self.policy.minimum_factors
                ),
            ));
        }

        let base = first_success
            .as_ref()
            .and_then(|result| result.principal())
            .ok_or_else(|| {
                AuthError::InvalidState("no successful result to derive a principal from".into())
            })?;
        let principal = Principal {
            identifier,
            display_name: base.display_name.clone(),
            roles: base.roles.clone(),
            authentication_type: "mfa".to_string(),
            authenticated_at: Utc::now(),
        };
        tracing::debug!(
            identifier = %principal.identifier,
            factors = satisfied.len(),
            "multi-factor authentication succeeded"
        );
        Ok(AuthenticationResult::success(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::Certificate;
    use crate::models::policy::{LockoutPolicy, PasswordPolicy};
    use crate::services::authenticator_manager::AuthenticatorManager;
    use crate::services::cert_validator::{CertificateValidator, TrustStore};
    use crate::services::providers::{
        CertificateAuthenticationProvider, PasswordAuthenticationProvider,
    };
    use crate::storage::InMemoryAuthenticatorStore;
    use crate::utils::password::BcryptHasher;
    use chrono::{Duration, Utc};
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    const PASSWORD: &str = "Hunter2!-abcdef";

    fn manager() -> Arc<AuthenticatorManager> {
        let policy = PasswordPolicy {
            expiry_days: 0,
            ..PasswordPolicy::default()
        };
        let lockout = LockoutPolicy::from_password_policy(&policy);
        Arc::new(AuthenticatorManager::new(
            Arc::new(InMemoryAuthenticatorStore::new()),
            Arc::new(BcryptHasher::new(4)),
            policy,
            lockout,
            Arc::new(CertificateValidator::new(Arc::new(TrustStore::new()))),
        ))
    }

    fn self_signed(subject: &str) -> Certificate {
        let key = SigningKey::generate(&mut OsRng);
        let now = Utc::now();
        let mut cert = Certificate::new(
            subject,
            subject,
            "1",
            now - Duration::days(1),
            now + Duration::days(30),
            key.verifying_key().to_bytes().to_vec(),
            Vec::new(),
        );
        cert.signature = key.sign(&cert.tbs_bytes()).to_bytes().to_vec();
        cert
    }

    fn coordinator_with(
        manager: Arc<AuthenticatorManager>,
        policy: MfaPolicy,
    ) -> MfaCoordinator {
        MfaCoordinator::new(
            vec![
                Arc::new(PasswordAuthenticationProvider::new(manager.clone())),
                Arc::new(CertificateAuthenticationProvider::new(manager)),
            ],
            policy,
        )
        .unwrap()
    }

    fn two_factor_policy() -> MfaPolicy {
        MfaPolicy {
            mfa_required: true,
            minimum_factors: 2,
            ..MfaPolicy::default()
        }
    }

    fn enrolled_manager() -> (Arc<AuthenticatorManager>, Certificate) {
        let manager = manager();
        let cert = self_signed("CN=alice");
        manager
            .create(&Credential::password("alice", PASSWORD))
            .unwrap();
        manager
            .create(&Credential::certificate("alice", cert.clone()))
            .unwrap();
        (manager, cert)
    }

    #[test]
    fn two_distinct_factors_satisfy_a_required_policy() {
        let (manager, cert) = enrolled_manager();
        let coordinator = coordinator_with(manager, two_factor_policy());
        let result = coordinator
            .authenticate(vec![
                Credential::password("alice", PASSWORD),
                Credential::certificate("alice", cert),
            ])
            .unwrap();
        assert!(result.is_success());
        assert_eq!(
            result.principal().unwrap().authentication_type,
            "mfa"
        );
    }

    #[test]
    fn one_factor_is_insufficient_when_two_are_required() {
        let (manager, _) = enrolled_manager();
        let coordinator = coordinator_with(manager, two_factor_policy());
        let result = coordinator
            .authenticate(vec![Credential::password("alice", PASSWORD)])
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::InsufficientFactors)
        );
    }

    #[test]
    fn mismatched_identifiers_are_rejected_up_front() {
        let coordinator = coordinator_with(manager(), MfaPolicy::default());
        let result = coordinator
            .authenticate(vec![
                Credential::password("alice", PASSWORD),
                Credential::password("bob", PASSWORD),
            ])
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::IdentifierMismatch)
        );
    }

    #[test]
    fn empty_credential_list_is_insufficient() {
        let coordinator = coordinator_with(manager(), MfaPolicy::default());
        let result = coordinator.authenticate(Vec::new()).unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::InsufficientFactors)
        );
    }

    #[test]
    fn missing_provider_reports_unsupported_type() {
        let manager = manager();
        manager
            .create(&Credential::password("alice", PASSWORD))
            .unwrap();
        // Only a password provider is registered.
        let coordinator = MfaCoordinator::new(
            vec![Arc::new(PasswordAuthenticationProvider::new(
                manager.clone(),
            ))],
            MfaPolicy::default(),
        )
        .unwrap();
        let result = coordinator
            .authenticate(vec![
                Credential::password("alice", PASSWORD),
                Credential::certificate("alice", self_signed("CN=alice")),
            ])
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::UnsupportedCredentialType)
        );
    }

    #[test]
    fn first_provider_failure_is_surfaced_unchanged() {
        let (manager, cert) = enrolled_manager();
        let coordinator = coordinator_with(manager, MfaPolicy::default());
        let result = coordinator
            .authenticate(vec![
                Credential::password("alice", "WrongPass1!abc"),
                Credential::certificate("alice", cert),
            ])
            .unwrap();
        assert_eq!(result.failure_code(), Some(AuthErrorCode::InvalidPassword));
        assert_eq!(
            result.failure_message(),
            Some("Invalid username or password")
        );
    }

    #[test]
    fn duplicate_factor_types_do_not_count_twice() {
        let manager = manager();
        manager
            .create(&Credential::password("alice", PASSWORD))
            .unwrap();
        let coordinator = coordinator_with(
            manager,
            MfaPolicy {
                mfa_required: true,
                minimum_factors: 2,
                ..MfaPolicy::default()
            },
        );
        // Two password credentials: enough entries, only one distinct type.
        let result = coordinator
            .authenticate(vec![
                Credential::password("alice", PASSWORD),
                Credential::password("alice", PASSWORD),
            ])
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::PolicyNotSatisfied)
        );
    }

    #[test]
    fn required_type_not_presented_fails_policy() {
        let manager = manager();
        manager
            .create(&Credential::password("alice", PASSWORD))
            .unwrap();
        let coordinator = coordinator_with(
            manager,
            MfaPolicy {
                required_types: vec![AuthenticatorType::PkiCert],
                ..MfaPolicy::default()
            },
        );
        let result = coordinator
            .authenticate(vec![Credential::password("alice", PASSWORD)])
            .unwrap();
        assert_eq!(
            result.failure_code(),
            Some(AuthErrorCode::PolicyNotSatisfied)
        );
    }

    #[test]
    fn successful_mfa_principal_reports_mfa_type() {
        let manager = manager();
        manager
            .create(&Credential::password("alice", PASSWORD))
            .unwrap();
        let coordinator = coordinator_with(manager, MfaPolicy::default());
        let result = coordinator
            .authenticate(vec![Credential::password("alice", PASSWORD)])
            .unwrap();
        assert!(result.is_success());
        let principal = result.principal().unwrap();
        assert_eq!(principal.authentication_type, "mfa");
        assert_eq!(principal.identifier, "alice");
    }
}
