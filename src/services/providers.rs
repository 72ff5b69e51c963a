//! Authentication providers: one per credential class, each turning a
//! presented credential into an authentication result.

use std::sync::Arc;

use crate::error::{AuthError, AuthErrorCode};
use crate::models::credential::Credential;
use crate::models::principal::{AuthenticationResult, Principal};
use crate::services::authenticator_manager::{AuthenticatorManager, CredentialVerdict};

/// Trait-level polymorphism over credential classes. Providers clear the
/// presented secret in the success-and-failure common path; callers must
/// not reuse the credential afterwards.
pub trait AuthenticationProvider: Send + Sync {
    fn supports(&self, credential: &Credential) -> bool;
    fn authenticate(&self, credential: &mut Credential)
        -> Result<AuthenticationResult, AuthError>;
}

/// Password-backed provider delegating to the authenticator manager.
pub struct PasswordAuthenticationProvider {
    manager: Arc<AuthenticatorManager>,
}

impl PasswordAuthenticationProvider {
    pub fn new(manager: Arc<AuthenticatorManager>) -> Self {
        Self { manager }
    }
}

impl AuthenticationProvider for PasswordAuthenticationProvider {
    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Password { .. })
    }

    fn authenticate(
        &self,
        credential: &mut Credential,
    ) -> Result<AuthenticationResult, AuthError> {
        let identifier = credential.identifier().to_string();
        let verdict = self.manager.validate(credential);
        credential.clear();
        Ok(verdict_to_result(&identifier, "password", verdict?))
    }
}

/// Certificate-backed provider delegating to the authenticator manager.
pub struct CertificateAuthenticationProvider {
    manager: Arc<AuthenticatorManager>,
}

impl CertificateAuthenticationProvider {
    pub fn new(manager: Arc<AuthenticatorManager>) -> Self {
        Self { manager }
    }
}

impl AuthenticationProvider for CertificateAuthenticationProvider {
    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Certificate { .. })
    }

    fn authenticate(
        &self,
        credential: &mut Credential,
    ) -> Result<AuthenticationResult, AuthError> {
        let identifier = credential.identifier().to_string();
        let verdict = self.manager.validate(credential);
        credential.clear();
        Ok(verdict_to_result(&identifier, "pki_cert", verdict?))
    }
}

fn verdict_to_result(
    identifier: &str,
    authentication_type: &str,
    verdict: CredentialVerdict,
) -> AuthenticationResult {
    match verdict {
        CredentialVerdict::Accepted => {
            tracing::debug!(identifier, authentication_type, "authentication succeeded");
            AuthenticationResult::success(Principal::new(identifier, authentication_type))
        }
        CredentialVerdict::Rejected(code) => {
            tracing::debug!(identifier, code = %code, "authentication failed");
            AuthenticationResult::failure(code, describe_rejection(code))
        }
    }
}

/// Caller-facing message for a rejection. Deliberately does not reveal
/// whether the identifier exists.
fn describe_rejection(code: AuthErrorCode) -> &'static str {
    match code {
        AuthErrorCode::AuthenticatorNotFound | AuthErrorCode::InvalidPassword => {
            "Invalid username or password"
        }
        AuthErrorCode::AuthenticatorLocked => "Account is temporarily locked",
        AuthErrorCode::AuthenticatorExpired => "Credential has expired",
        AuthErrorCode::AuthenticatorRevoked => "Credential has been revoked",
        AuthErrorCode::CertificateInvalid => "Certificate validation failed",
        _ => "Authentication failed",
    }
}
