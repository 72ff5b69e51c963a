//! Policy value objects governing passwords, lockout, and multi-factor
//! composition. All of them are immutable once constructed; services keep
//! their own copies.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::authenticator::AuthenticatorType;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Password composition, history, expiry, and lockout thresholds.
pub struct PasswordPolicy {
    /// Minimum password length; never below 8.
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// Number of most-recent password hashes retained for reuse checks.
    pub history_size: usize,
    /// Days until a new password expires; 0 disables expiry.
    pub expiry_days: i64,
    /// Failed attempts inside the window before the account locks; never
    /// below 1.
    pub max_failed_attempts: u32,
    /// Sliding window over which failed attempts are counted.
    pub lockout_window_minutes: i64,
    /// How long a lockout lasts once triggered.
    pub lockout_duration_minutes: i64,
}

impl PasswordPolicy {
    /// Normalizes out-of-range fields: `min_length` is raised to 8 and
    /// `max_failed_attempts` to 1.
    pub fn normalized(mut self) -> Self {
        self.min_length = self.min_length.max(8);
        self.max_failed_attempts = self.max_failed_attempts.max(1);
        self
    }

    /// Expiry instant for a password set at `now`, or `None` when expiry is
    /// disabled.
    pub fn expires_at(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        if self.expiry_days > 0 {
            Some(now + chrono::Duration::days(self.expiry_days))
        } else {
            None
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            history_size: 5,
            expiry_days: 90,
            max_failed_attempts: 3,
            lockout_window_minutes: 15,
            lockout_duration_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
/// Lockout schedule applied by storage when recording login failures.
pub struct LockoutPolicy {
    pub threshold: u32,
    pub window_minutes: i64,
    pub duration_minutes: i64,
    pub backoff_enabled: bool,
    pub max_duration_hours: i64,
}

impl LockoutPolicy {
    pub fn from_password_policy(policy: &PasswordPolicy) -> Self {
        Self {
            threshold: policy.max_failed_attempts,
            window_minutes: policy.lockout_window_minutes,
            duration_minutes: policy.lockout_duration_minutes,
            backoff_enabled: false,
            max_duration_hours: 24,
        }
    }

    /// Lockout duration for the nth lockout. With backoff enabled each
    /// lockout doubles the base duration, capped at `max_duration_hours`.
    pub fn duration_minutes_for(&self, lockout_count: u32) -> i64 {
        let base = self.duration_minutes.max(1);
        if !self.backoff_enabled {
            return base;
        }

        let exponent = lockout_count.saturating_sub(1).clamp(0, 20);
        let multiplier = 2_i64.saturating_pow(exponent);
        let minutes = base.saturating_mul(multiplier);
        let max_minutes = self.max_duration_hours.max(1).saturating_mul(60);
        minutes.min(max_minutes)
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        LockoutPolicy::from_password_policy(&PasswordPolicy::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Multi-factor composition requirements.
pub struct MfaPolicy {
    pub mfa_required: bool,
    /// Distinct factor types an authentication must satisfy.
    pub minimum_factors: usize,
    /// Factor types that must all be present among the satisfied set.
    pub required_types: Vec<AuthenticatorType>,
    /// Factor types permitted at all; empty means any type is allowed.
    pub allowed_types: Vec<AuthenticatorType>,
    pub privileged_account: bool,
}

impl MfaPolicy {
    /// Checks the structural invariants: `minimum_factors ≥ 1` (≥ 2 when MFA
    /// is required) and `required_types ⊆ allowed_types` whenever the
    /// allow-list is non-empty.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.minimum_factors < 1 {
            return Err(AuthError::InvalidArgument(
                "minimum_factors must be at least 1".into(),
            ));
        }
        if self.mfa_required && self.minimum_factors < 2 {
            return Err(AuthError::InvalidArgument(
                "minimum_factors must be at least 2 when MFA is required".into(),
            ));
        }
        if !self.allowed_types.is_empty() {
            for required in &self.required_types {
                if !self.allowed_types.contains(required) {
                    return Err(AuthError::InvalidArgument(format!(
                        "required factor type '{}' is not in the allowed set",
                        required
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the given factor type is permitted; an empty allow-list
    /// permits every type.
    pub fn allows(&self, factor: AuthenticatorType) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(&factor)
    }
}

impl Default for MfaPolicy {
    fn default() -> Self {
        Self {
            mfa_required: false,
            minimum_factors: 1,
            required_types: Vec::new(),
            allowed_types: Vec::new(),
            privileged_account: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy_normalization_raises_floors() {
        let policy = PasswordPolicy {
            min_length: 4,
            max_failed_attempts: 0,
            ..PasswordPolicy::default()
        }
        .normalized();
        assert_eq!(policy.min_length, 8);
        assert_eq!(policy.max_failed_attempts, 1);
    }

    #[test]
    fn expiry_disabled_when_days_zero() {
        let policy = PasswordPolicy {
            expiry_days: 0,
            ..PasswordPolicy::default()
        };
        assert!(policy.expires_at(chrono::Utc::now()).is_none());

        let policy = PasswordPolicy {
            expiry_days: 90,
            ..PasswordPolicy::default()
        };
        let now = chrono::Utc::now();
        assert_eq!(
            policy.expires_at(now),
            Some(now + chrono::Duration::days(90))
        );
    }

    #[test]
    fn lockout_duration_applies_backoff_and_cap() {
        let policy = LockoutPolicy {
            threshold: 5,
            window_minutes: 15,
            duration_minutes: 15,
            backoff_enabled: true,
            max_duration_hours: 24,
        };
        assert_eq!(policy.duration_minutes_for(1), 15);
        assert_eq!(policy.duration_minutes_for(2), 30);
        assert_eq!(policy.duration_minutes_for(3), 60);
        assert_eq!(policy.duration_minutes_for(8), 1440);
    }

    #[test]
    fn lockout_duration_fixed_when_backoff_disabled() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.duration_minutes_for(1), 15);
        assert_eq!(policy.duration_minutes_for(5), 15);
    }

    #[test]
    fn mfa_policy_rejects_required_outside_allowed() {
        let policy = MfaPolicy {
            mfa_required: true,
            minimum_factors: 2,
            required_types: vec![AuthenticatorType::PkiCert],
            allowed_types: vec![AuthenticatorType::Password],
            privileged_account: false,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn mfa_policy_requires_two_factors_when_required() {
        let policy = MfaPolicy {
            mfa_required: true,
            minimum_factors: 1,
            ..MfaPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn empty_allow_list_permits_any_type() {
        let policy = MfaPolicy::default();
        assert!(policy.allows(AuthenticatorType::Password));
        assert!(policy.allows(AuthenticatorType::HardwareToken));

        let restricted = MfaPolicy {
            allowed_types: vec![AuthenticatorType::Password],
            ..MfaPolicy::default()
        };
        assert!(restricted.allows(AuthenticatorType::Password));
        assert!(!restricted.allows(AuthenticatorType::PkiCert));
    }
}
