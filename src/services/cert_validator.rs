//! Certificate validation and the trust store backing the PKI path.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::AuthError;
use crate::models::certificate::Certificate;

#[derive(Debug, Clone)]
/// Outcome of running a certificate through the validator.
pub struct CertificateValidation {
    pub valid: bool,
    pub message: String,
    pub violations: Vec<String>,
}

impl CertificateValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            message: "certificate is valid".to_string(),
            violations: Vec::new(),
        }
    }

    fn invalid(message: &str, violations: Vec<String>) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            violations,
        }
    }
}

/// Trust anchors keyed by subject DN. The store keeps its own copies; a
/// certificate added here is never mutated afterwards.
#[derive(Debug, Default)]
pub struct TrustStore {
    anchors: DashMap<String, Certificate>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trust anchor. Anchors with keys that cannot back signature
    /// verification are rejected up front so the store never holds
    /// malformed state.
    pub fn add_certificate(&self, certificate: Certificate) -> Result<(), AuthError> {
        if certificate.subject_dn.is_empty() {
            return Err(AuthError::InvalidArgument(
                "trust anchor subject DN must not be empty".into(),
            ));
        }
        if parse_verifying_key(&certificate.public_key).is_none() {
            return Err(AuthError::InvalidArgument(
                "trust anchor public key is not a valid Ed25519 key".into(),
            ));
        }
        self.anchors
            .insert(certificate.subject_dn.clone(), certificate);
        Ok(())
    }

    pub fn remove_certificate(&self, subject_dn: &str) -> bool {
        self.anchors.remove(subject_dn).is_some()
    }

    pub fn find_by_subject(&self, subject_dn: &str) -> Option<Certificate> {
        self.anchors.get(subject_dn).map(|anchor| anchor.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }
}

/// Validates presented certificates in three phases: format, validity
/// window, trust chain. Validation stops at the first phase that records
/// violations.
pub struct CertificateValidator {
    trust_store: Arc<TrustStore>,
}

impl CertificateValidator {
    pub fn new(trust_store: Arc<TrustStore>) -> Self {
        Self { trust_store }
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    pub fn validate(&self, certificate: &Certificate) -> CertificateValidation {
        let mut violations = Vec::new();
        if certificate.subject_dn.is_empty() {
            violations.push("Certificate subject DN is missing".to_string());
        }
        if certificate.issuer_dn.is_empty() {
            violations.push("Certificate issuer DN is missing".to_string());
        }
        if certificate.serial_number.is_empty() {
            violations.push("Certificate serial number is missing".to_string());
        }
        if !violations.is_empty() {
            return CertificateValidation::invalid("certificate format check failed", violations);
        }

        let now = Utc::now();
        if now < certificate.not_before {
            violations.push(format!(
                "Certificate is not yet valid (notBefore {})",
                certificate.not_before
            ));
        }
        if now > certificate.not_after {
            violations.push(format!(
                "Certificate has expired (notAfter {})",
                certificate.not_after
            ));
        }
        if !violations.is_empty() {
            return CertificateValidation::invalid("certificate validity check failed", violations);
        }

        // An empty trust store passes the chain phase: the explicit escape
        // hatch for test and bootstrap configurations.
        if !self.trust_store.is_empty() {
            match self.trust_store.find_by_subject(&certificate.issuer_dn) {
                None => violations.push(format!(
                    "No trust anchor matches issuer '{}'",
                    certificate.issuer_dn
                )),
                Some(anchor) => {
                    if !verify_signature(&anchor, certificate) {
                        violations.push(
                            "Certificate signature does not verify against the issuer key"
                                .to_string(),
                        );
                    }
                }
            }
            if !violations.is_empty() {
                tracing::warn!(
                    subject = %certificate.subject_dn,
                    issuer = %certificate.issuer_dn,
                    "certificate failed trust-chain verification"
                );
                return CertificateValidation::invalid(
                    "certificate trust-chain check failed",
                    violations,
                );
            }
        }

        CertificateValidation::ok()
    }
}

fn parse_verifying_key(bytes: &[u8]) -> Option<VerifyingKey> {
    let key_bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&key_bytes).ok()
}

fn verify_signature(anchor: &Certificate, certificate: &Certificate) -> bool {
    let Some(key) = parse_verifying_key(&anchor.public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&certificate.signature) else {
        return false;
    };
    key.verify(&certificate.tbs_bytes(), &signature).is_ok()
}
