#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use gatekeeper::{
    AuthenticatorManager, Certificate, CertificateValidator, Config, Credential,
    InMemoryAuthenticatorStore, InMemorySessionStore, LockoutPolicy, PasswordPolicy,
    SessionManager, TrustStore,
};
use gatekeeper::utils::password::BcryptHasher;

pub const TEST_PASSWORD: &str = "Hunter2!-abcdef";

/// Configuration tuned for tests: fast hashing, no password expiry.
pub fn test_config() -> Config {
    Config {
        bcrypt_cost: 4,
        password_expiration_days: 0,
        ..Config::default()
    }
}

pub fn test_password_policy() -> PasswordPolicy {
    test_config().password_policy()
}

pub fn authenticator_manager() -> Arc<AuthenticatorManager> {
    authenticator_manager_with(test_password_policy(), Arc::new(TrustStore::new()))
}

pub fn authenticator_manager_with(
    policy: PasswordPolicy,
    trust: Arc<TrustStore>,
) -> Arc<AuthenticatorManager> {
    let (_, manager) = authenticator_manager_with_store(policy, trust);
    manager
}

/// Variant handing back the backing store for tests that seed state
/// directly.
pub fn authenticator_manager_with_store(
    policy: PasswordPolicy,
    trust: Arc<TrustStore>,
) -> (Arc<InMemoryAuthenticatorStore>, Arc<AuthenticatorManager>) {
    let store = Arc::new(InMemoryAuthenticatorStore::new());
    let lockout = LockoutPolicy::from_password_policy(&policy);
    let manager = Arc::new(AuthenticatorManager::new(
        store.clone(),
        Arc::new(BcryptHasher::new(4)),
        policy,
        lockout,
        Arc::new(CertificateValidator::new(trust)),
    ));
    (store, manager)
}

pub fn session_manager() -> (Arc<InMemorySessionStore>, SessionManager) {
    session_manager_with(test_config())
}

pub fn session_manager_with(config: Config) -> (Arc<InMemorySessionStore>, SessionManager) {
    let store = Arc::new(InMemorySessionStore::new());
    let manager = SessionManager::new(store.clone(), &config);
    (store, manager)
}

/// An issuing key plus its self-signed anchor certificate.
pub fn certificate_authority(name: &str) -> (SigningKey, Certificate) {
    let key = SigningKey::generate(&mut OsRng);
    let cert = issue_certificate(&key, name, name, key.verifying_key().to_bytes().to_vec());
    (key, cert)
}

/// A leaf certificate signed by the given authority key.
pub fn issue_certificate(
    authority: &SigningKey,
    subject_dn: &str,
    issuer_dn: &str,
    public_key: Vec<u8>,
) -> Certificate {
    let now = Utc::now();
    let mut cert = Certificate::new(
        subject_dn,
        issuer_dn,
        "1000",
        now - Duration::days(1),
        now + Duration::days(364),
        public_key,
        Vec::new(),
    );
    cert.signature = authority.sign(&cert.tbs_bytes()).to_bytes().to_vec();
    cert
}

/// A self-signed certificate carrying its own verifying key.
pub fn self_signed_certificate(subject_dn: &str) -> Certificate {
    let key = SigningKey::generate(&mut OsRng);
    issue_certificate(
        &key,
        subject_dn,
        subject_dn,
        key.verifying_key().to_bytes().to_vec(),
    )
}

/// Enrolls a password authenticator for the identifier.
pub fn enroll_password(manager: &AuthenticatorManager, identifier: &str, password: &str) {
    manager
        .create(&Credential::password(identifier, password))
        .expect("enroll password authenticator");
}
