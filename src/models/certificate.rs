//! Certificate value object used by the PKI authenticator path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// An immutable certificate presented by a client or held as a trust anchor.
///
/// Stores retain their own copies; nothing in the core mutates a certificate
/// after construction.
pub struct Certificate {
    /// Distinguished name of the subject the certificate was issued to.
    pub subject_dn: String,
    /// Distinguished name of the issuing authority.
    pub issuer_dn: String,
    /// Issuer-assigned serial number.
    pub serial_number: String,
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    pub not_after: DateTime<Utc>,
    /// Ed25519 verifying key of the subject, raw 32 bytes.
    pub public_key: Vec<u8>,
    /// Issuer signature over the to-be-signed bytes, raw 64 bytes.
    pub signature: Vec<u8>,
}

impl Certificate {
    pub fn new(
        subject_dn: impl Into<String>,
        issuer_dn: impl Into<String>,
        serial_number: impl Into<String>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        public_key: Vec<u8>,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            subject_dn: subject_dn.into(),
            issuer_dn: issuer_dn.into(),
            serial_number: serial_number.into(),
            not_before,
            not_after,
            public_key,
            signature,
        }
    }

    /// Canonical byte rendering of the signed portion: every field except the
    /// signature, length-prefixed so adjacent fields cannot alias.
    pub fn tbs_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field(&mut buf, self.subject_dn.as_bytes());
        write_field(&mut buf, self.issuer_dn.as_bytes());
        write_field(&mut buf, self.serial_number.as_bytes());
        write_field(&mut buf, &self.not_before.timestamp().to_be_bytes());
        write_field(&mut buf, &self.not_after.timestamp().to_be_bytes());
        write_field(&mut buf, &self.public_key);
        buf
    }

    /// Full encoded form, the input to the fingerprint digest.
    pub fn encoded(&self) -> Vec<u8> {
        let mut buf = self.tbs_bytes();
        write_field(&mut buf, &self.signature);
        buf
    }

    /// Hex-encoded SHA-256 digest over the encoded certificate.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.encoded());
        hex::encode(digest)
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject_dn == self.issuer_dn
    }
}

fn write_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}
