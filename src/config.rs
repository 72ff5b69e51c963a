use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::models::policy::{LockoutPolicy, PasswordPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Runtime configuration for the access-management core.
///
/// Every option can be supplied through the process environment under its
/// SCREAMING_SNAKE_CASE key (dots become underscores); unset keys fall back
/// to the defaults below.
pub struct Config {
    /// Maximum absolute session age before it expires, in minutes.
    pub session_timeout_minutes: i64,
    /// Maximum gap since the last access before a session expires.
    pub inactivity_timeout_seconds: i64,
    /// Age of the last identity proof before re-authentication is demanded.
    pub reauth_timeout_seconds: i64,
    /// Failed attempts inside the lockout window before the account locks.
    pub max_login_attempts: u32,
    /// How long a lockout lasts once triggered.
    pub account_lockout_minutes: i64,
    /// Sliding window over which failed attempts are counted.
    pub lockout_window_minutes: i64,
    /// Doubles the lockout duration on each repeated lockout.
    pub account_lockout_backoff_enabled: bool,
    /// Upper bound for backed-off lockouts.
    pub account_lockout_max_duration_hours: i64,
    pub password_min_length: usize,
    pub password_require_uppercase: bool,
    pub password_require_lowercase: bool,
    pub password_require_numbers: bool,
    pub password_require_symbols: bool,
    /// Days until a password expires; 0 disables expiry.
    pub password_expiration_days: i64,
    pub password_history_size: usize,
    /// Live sessions a user may hold at once.
    pub max_concurrent_sessions: usize,
    /// Work factor for the password hasher, clamped to [4, 31].
    pub bcrypt_cost: u32,
    pub enforce_ip_binding: bool,
    pub enforce_user_agent_binding: bool,
    /// Pass-through for token-issuing layers above the core.
    pub token_expiration_minutes: i64,
    pub enable_audit_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 30,
            inactivity_timeout_seconds: 1800,
            reauth_timeout_seconds: 3600,
            max_login_attempts: 3,
            account_lockout_minutes: 15,
            lockout_window_minutes: 15,
            account_lockout_backoff_enabled: false,
            account_lockout_max_duration_hours: 24,
            password_min_length: 12,
            password_require_uppercase: true,
            password_require_lowercase: true,
            password_require_numbers: true,
            password_require_symbols: true,
            password_expiration_days: 90,
            password_history_size: 5,
            max_concurrent_sessions: 3,
            bcrypt_cost: 12,
            enforce_ip_binding: true,
            enforce_user_agent_binding: true,
            token_expiration_minutes: 60,
            enable_audit_logging: true,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to
    /// the defaults for unset keys.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Config::default();

        let config = Config {
            session_timeout_minutes: env_or("SESSION_TIMEOUT_MINUTES", defaults.session_timeout_minutes),
            inactivity_timeout_seconds: env_or(
                "INACTIVITY_TIMEOUT_SECONDS",
                defaults.inactivity_timeout_seconds,
            ),
            reauth_timeout_seconds: env_or("REAUTH_TIMEOUT_SECONDS", defaults.reauth_timeout_seconds),
            max_login_attempts: env_or("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts).max(1),
            account_lockout_minutes: env_or(
                "ACCOUNT_LOCKOUT_MINUTES",
                defaults.account_lockout_minutes,
            ),
            lockout_window_minutes: env_or("LOCKOUT_WINDOW_MINUTES", defaults.lockout_window_minutes),
            account_lockout_backoff_enabled: env_or(
                "ACCOUNT_LOCKOUT_BACKOFF_ENABLED",
                defaults.account_lockout_backoff_enabled,
            ),
            account_lockout_max_duration_hours: env_or(
                "ACCOUNT_LOCKOUT_MAX_DURATION_HOURS",
                defaults.account_lockout_max_duration_hours,
            ),
            password_min_length: env_or("PASSWORD_MIN_LENGTH", defaults.password_min_length).max(8),
            password_require_uppercase: env_or(
                "PASSWORD_REQUIRE_UPPERCASE",
                defaults.password_require_uppercase,
            ),
            password_require_lowercase: env_or(
                "PASSWORD_REQUIRE_LOWERCASE",
                defaults.password_require_lowercase,
            ),
            password_require_numbers: env_or(
                "PASSWORD_REQUIRE_NUMBERS",
                defaults.password_require_numbers,
            ),
            password_require_symbols: env_or(
                "PASSWORD_REQUIRE_SYMBOLS",
                defaults.password_require_symbols,
            ),
            password_expiration_days: env_or(
                "PASSWORD_EXPIRATION_DAYS",
                defaults.password_expiration_days,
            ),
            password_history_size: env_or("PASSWORD_HISTORY_SIZE", defaults.password_history_size),
            max_concurrent_sessions: env_or(
                "MAX_CONCURRENT_SESSIONS",
                defaults.max_concurrent_sessions,
            )
            .max(1),
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost),
            enforce_ip_binding: env_or("ENFORCE_IP_BINDING", defaults.enforce_ip_binding),
            enforce_user_agent_binding: env_or(
                "ENFORCE_USER_AGENT_BINDING",
                defaults.enforce_user_agent_binding,
            ),
            token_expiration_minutes: env_or(
                "TOKEN_EXPIRATION_MINUTES",
                defaults.token_expiration_minutes,
            ),
            enable_audit_logging: env_or("ENABLE_AUDIT_LOGGING", defaults.enable_audit_logging),
        };
        Ok(config)
    }

    /// Password policy value derived from this configuration.
    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            min_length: self.password_min_length,
            require_uppercase: self.password_require_uppercase,
            require_lowercase: self.password_require_lowercase,
            require_digit: self.password_require_numbers,
            require_special: self.password_require_symbols,
            history_size: self.password_history_size,
            expiry_days: self.password_expiration_days,
            max_failed_attempts: self.max_login_attempts,
            lockout_window_minutes: self.lockout_window_minutes,
            lockout_duration_minutes: self.account_lockout_minutes,
        }
        .normalized()
    }

    /// Lockout schedule derived from this configuration.
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            threshold: self.max_login_attempts,
            window_minutes: self.lockout_window_minutes,
            duration_minutes: self.account_lockout_minutes,
            backoff_enabled: self.account_lockout_backoff_enabled,
            max_duration_hours: self.account_lockout_max_duration_hours,
        }
    }

    pub fn session_timeout_seconds(&self) -> i64 {
        self.session_timeout_minutes * 60
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
