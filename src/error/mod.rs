use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Stable error codes emitted at the library boundary.
pub enum AuthErrorCode {
    InsufficientFactors,
    IdentifierMismatch,
    UnsupportedCredentialType,
    PolicyNotSatisfied,
    AuthenticatorNotFound,
    AuthenticatorRevoked,
    AuthenticatorLocked,
    AuthenticatorExpired,
    InvalidPassword,
    CertificateInvalid,
    InvalidCredentialType,
    ConcurrentLimitExceeded,
}

impl AuthErrorCode {
    /// Returns the canonical SCREAMING_SNAKE_CASE representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::InsufficientFactors => "INSUFFICIENT_FACTORS",
            AuthErrorCode::IdentifierMismatch => "IDENTIFIER_MISMATCH",
            AuthErrorCode::UnsupportedCredentialType => "UNSUPPORTED_CREDENTIAL_TYPE",
            AuthErrorCode::PolicyNotSatisfied => "POLICY_NOT_SATISFIED",
            AuthErrorCode::AuthenticatorNotFound => "AUTHENTICATOR_NOT_FOUND",
            AuthErrorCode::AuthenticatorRevoked => "AUTHENTICATOR_REVOKED",
            AuthErrorCode::AuthenticatorLocked => "AUTHENTICATOR_LOCKED",
            AuthErrorCode::AuthenticatorExpired => "AUTHENTICATOR_EXPIRED",
            AuthErrorCode::InvalidPassword => "INVALID_PASSWORD",
            AuthErrorCode::CertificateInvalid => "CERTIFICATE_INVALID",
            AuthErrorCode::InvalidCredentialType => "INVALID_CREDENTIAL_TYPE",
            AuthErrorCode::ConcurrentLimitExceeded => "CONCURRENT_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
/// Faults raised by storage backends.
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
/// Operational faults raised by management and lifecycle operations.
///
/// Authentication *outcomes* (wrong password, locked account, unsatisfied
/// MFA policy) are not faults; they travel inside
/// [`crate::models::principal::AuthenticationResult`]. A fault means the
/// operation itself could not be carried out.
pub enum AuthError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no authenticator of the requested type exists for '{identifier}'")]
    NotFound { identifier: String },
    #[error("an authenticator of this type already exists for '{identifier}'")]
    Duplicate { identifier: String },
    #[error("password policy violation: {}", .0.join("; "))]
    PolicyViolation(Vec<String>),
    #[error("password matches a retained history entry")]
    PasswordReuse,
    #[error("credential rejected: {0}")]
    CredentialRejected(AuthErrorCode),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("concurrent session limit exceeded for user '{0}'")]
    ConcurrentLimitExceeded(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Maps the fault onto a boundary error code where one applies.
    pub fn code(&self) -> Option<AuthErrorCode> {
        match self {
            AuthError::NotFound { .. } => Some(AuthErrorCode::AuthenticatorNotFound),
            AuthError::CredentialRejected(code) => Some(*code),
            AuthError::ConcurrentLimitExceeded(_) => Some(AuthErrorCode::ConcurrentLimitExceeded),
            _ => None,
        }
    }
}
