//! Password-policy evaluation rules.

use crate::models::policy::PasswordPolicy;

/// Character set counted as "special" for complexity checks.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`";

#[derive(Debug, Clone)]
/// Result of evaluating a candidate password against a policy. Every failing
/// check is reported so callers can surface the complete set.
pub struct PolicyEvaluation {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Evaluates the candidate in fixed order: length, uppercase, lowercase,
/// digit, special. No short-circuiting between checks.
pub fn evaluate_password(policy: &PasswordPolicy, password: &str) -> PolicyEvaluation {
    let mut violations = Vec::new();

    if password.len() < policy.min_length {
        violations.push(format!(
            "Password must be at least {} characters long",
            policy.min_length
        ));
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        violations.push("Password must contain at least one uppercase letter".to_string());
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        violations.push("Password must contain at least one lowercase letter".to_string());
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least one digit".to_string());
    }
    if policy.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push("Password must contain at least one special character".to_string());
    }

    PolicyEvaluation {
        valid: violations.is_empty(),
        violations,
    }
}
