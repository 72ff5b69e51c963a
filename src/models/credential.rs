//! Client-presented credentials and the secret material they carry.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::authenticator::AuthenticatorType;
use crate::models::certificate::Certificate;

/// Mutable buffer holding a raw secret. Zeroed on `clear` and again on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuffer(Vec<u8>);

impl SecretBuffer {
    pub fn new(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Returns the secret as a string slice when it holds valid UTF-8.
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Zeroes the buffer in place. Safe to call more than once.
    pub fn clear(&mut self) {
        self.0.zeroize();
        self.0.clear();
    }

    pub fn is_cleared(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

#[derive(Debug, Clone)]
/// Material presented by a client to prove possession of an authenticator.
pub enum Credential {
    Password {
        identifier: String,
        secret: SecretBuffer,
    },
    Certificate {
        identifier: String,
        certificate: Certificate,
    },
}

impl Credential {
    pub fn password(identifier: &str, password: &str) -> Self {
        Credential::Password {
            identifier: identifier.to_string(),
            secret: SecretBuffer::new(password),
        }
    }

    pub fn certificate(identifier: &str, certificate: Certificate) -> Self {
        Credential::Certificate {
            identifier: identifier.to_string(),
            certificate,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Credential::Password { identifier, .. } => identifier,
            Credential::Certificate { identifier, .. } => identifier,
        }
    }

    /// The authenticator type this credential proves possession of.
    pub fn factor_type(&self) -> AuthenticatorType {
        match self {
            Credential::Password { .. } => AuthenticatorType::Password,
            Credential::Certificate { .. } => AuthenticatorType::PkiCert,
        }
    }

    /// Zeroes any raw secret carried by the credential. Certificates are
    /// public material and are left untouched.
    pub fn clear(&mut self) {
        if let Credential::Password { secret, .. } = self {
            secret.clear();
        }
    }
}
