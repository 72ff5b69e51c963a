//! The authenticated subject and the result record carrying authentication
//! outcomes across the library boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthErrorCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Subject emitted on successful authentication.
pub struct Principal {
    /// The identifier the authentication was performed against.
    pub identifier: String,
    /// Human-readable name; defaults to the identifier.
    pub display_name: String,
    /// Opaque role attributes; the core never interprets them.
    pub roles: Vec<String>,
    /// Mechanism that produced this principal, e.g. "password" or "mfa".
    pub authentication_type: String,
    pub authenticated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(identifier: &str, authentication_type: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: identifier.to_string(),
            roles: Vec::new(),
            authentication_type: authentication_type.to_string(),
            authenticated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
/// What an authentication attempt produced.
pub enum AuthOutcome {
    Success(Principal),
    Failure { code: AuthErrorCode, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Outcome record returned by providers and the MFA coordinator.
///
/// Failures here are ordinary data, surfaced to the caller verbatim;
/// operational faults travel as [`crate::error::AuthError`] instead.
pub struct AuthenticationResult {
    pub outcome: AuthOutcome,
    pub timestamp: DateTime<Utc>,
    /// Network address the attempt originated from, when known.
    pub source_address: Option<String>,
}

impl AuthenticationResult {
    pub fn success(principal: Principal) -> Self {
        Self {
            outcome: AuthOutcome::Success(principal),
            timestamp: Utc::now(),
            source_address: None,
        }
    }

    pub fn failure(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            outcome: AuthOutcome::Failure {
                code,
                message: message.into(),
            },
            timestamp: Utc::now(),
            source_address: None,
        }
    }

    pub fn with_source_address(mut self, address: &str) -> Self {
        self.source_address = Some(address.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AuthOutcome::Success(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match &self.outcome {
            AuthOutcome::Success(principal) => Some(principal),
            AuthOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_code(&self) -> Option<AuthErrorCode> {
        match &self.outcome {
            AuthOutcome::Failure { code, .. } => Some(*code),
            AuthOutcome::Success(_) => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            AuthOutcome::Failure { message, .. } => Some(message),
            AuthOutcome::Success(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_exposes_principal() {
        let result = AuthenticationResult::success(Principal::new("alice", "password"));
        assert!(result.is_success());
        assert_eq!(result.principal().unwrap().identifier, "alice");
        assert_eq!(result.principal().unwrap().authentication_type, "password");
        assert!(result.failure_code().is_none());
    }

    #[test]
    fn failure_result_exposes_code_and_message() {
        let result = AuthenticationResult::failure(
            AuthErrorCode::InvalidPassword,
            "Invalid username or password",
        )
        .with_source_address("192.168.1.100");
        assert!(!result.is_success());
        assert_eq!(result.failure_code(), Some(AuthErrorCode::InvalidPassword));
        assert_eq!(
            result.failure_message(),
            Some("Invalid username or password")
        );
        assert_eq!(result.source_address.as_deref(), Some("192.168.1.100"));
    }
}
