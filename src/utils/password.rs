use crate::error::AuthError;

/// Lowest work factor bcrypt accepts.
pub const MIN_COST: u32 = 4;
/// Highest work factor bcrypt accepts.
pub const MAX_COST: u32 = 31;

/// Adaptive password hashing contract. The salt is embedded in the output
/// and verification is constant-time on the tag.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
    /// True when the stored hash was produced with a different work factor
    /// than the configured one, or is not in a recognized format.
    fn needs_rehash(&self, hash: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher with the given work factor, clamped to [4, 31].
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidArgument(
                "password must not be empty".into(),
            ));
        }
        bcrypt::hash(password, self.cost).map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        if password.is_empty() || hash.is_empty() {
            return Err(AuthError::InvalidArgument(
                "password and hash must not be empty".into(),
            ));
        }
        // A hash that fails to parse is treated as a mismatch, not a fault.
        Ok(bcrypt::verify(password, hash).unwrap_or(false))
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        match embedded_cost(hash) {
            Some(cost) => cost != self.cost,
            None => true,
        }
    }
}

/// Extracts the work factor embedded in a `$2<x>$<cost>$...` hash.
fn embedded_cost(hash: &str) -> Option<u32> {
    let mut parts = hash.split('$');
    if !parts.next()?.is_empty() {
        return None;
    }
    let version = parts.next()?;
    if !matches!(version, "2a" | "2b" | "2x" | "2y") {
        return None;
    }
    let cost: u32 = parts.next()?.parse().ok()?;
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return None;
    }
    parts.next().filter(|rest| !rest.is_empty())?;
    Some(cost)
}
