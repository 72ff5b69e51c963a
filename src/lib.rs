//! Identity, authenticator, and session core for NIST 800-53 aligned
//! access management.
//!
//! The crate answers three coupled questions for each request: which
//! authenticator currently binds to an identifier and whether it is usable,
//! whether a presented credential matches it under the active policy, and
//! whether the resulting session is still live, bound to its origin, and
//! free of pending re-authentication demands.
//!
//! Everything is in-process and thread-safe; storage is pluggable behind
//! the traits in [`storage`], with in-memory implementations provided.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use error::{AuthError, AuthErrorCode, StorageError};
pub use models::authenticator::{
    Authenticator, AuthenticatorKind, AuthenticatorStatus, AuthenticatorType,
};
pub use models::certificate::Certificate;
pub use models::credential::{Credential, SecretBuffer};
pub use models::policy::{LockoutPolicy, MfaPolicy, PasswordPolicy};
pub use models::principal::{AuthOutcome, AuthenticationResult, Principal};
pub use models::session::{ReauthReason, Session, SessionState};
pub use services::authenticator_manager::{AuthenticatorManager, CredentialVerdict};
pub use services::cert_validator::{CertificateValidation, CertificateValidator, TrustStore};
pub use services::hijacking::HijackingPrevention;
pub use services::mfa::MfaCoordinator;
pub use services::providers::{
    AuthenticationProvider, CertificateAuthenticationProvider, PasswordAuthenticationProvider,
};
pub use services::reauth::{ReauthenticationPolicy, SessionTimeoutManager, TimeoutDisposition};
pub use services::session_lifecycle::SessionLifecycle;
pub use services::session_manager::SessionManager;
pub use storage::{
    AuthenticatorStore, InMemoryAuthenticatorStore, InMemorySessionStore, SessionStore,
};
pub use utils::password::{BcryptHasher, PasswordHasher};
