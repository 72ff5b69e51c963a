//! Re-authentication policy and the per-tick timeout evaluation.

use chrono::{DateTime, Utc};

use crate::models::session::{ReauthReason, Session};

#[derive(Debug, Clone, Copy)]
/// Time-based re-authentication demand: a session whose last proof of
/// identity is older than the timeout must re-authenticate.
pub struct ReauthenticationPolicy {
    pub reauth_timeout_seconds: i64,
}

impl ReauthenticationPolicy {
    pub fn new(reauth_timeout_seconds: i64) -> Self {
        Self {
            reauth_timeout_seconds,
        }
    }

    /// True when the session already carries pending reasons, or its last
    /// re-authentication is older than the timeout.
    pub fn requires_reauthentication(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.requires_reauthentication()
            || session.seconds_since_reauthentication(now) > self.reauth_timeout_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a session expired during a timeout tick.
pub enum ExpiryCause {
    MaxAge,
    Inactivity,
}

impl ExpiryCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryCause::MaxAge => "max_age",
            ExpiryCause::Inactivity => "inactivity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of one timeout evaluation over a session.
pub enum TimeoutDisposition {
    Unchanged,
    Expired(ExpiryCause),
    ReauthenticationDue,
}

#[derive(Debug, Clone, Copy)]
/// Evaluates the three independent timeouts. Per tick the first matching
/// check wins: absolute age, then inactivity, then re-authentication age.
pub struct SessionTimeoutManager {
    session_timeout_seconds: i64,
    inactivity_timeout_seconds: i64,
    reauth_timeout_seconds: i64,
}

impl SessionTimeoutManager {
    pub fn new(
        session_timeout_seconds: i64,
        inactivity_timeout_seconds: i64,
        reauth_timeout_seconds: i64,
    ) -> Self {
        Self {
            session_timeout_seconds,
            inactivity_timeout_seconds,
            reauth_timeout_seconds,
        }
    }

    /// Applies the per-tick state change: expiry for age or inactivity, the
    /// SESSION_TIMEOUT reason for a stale re-authentication. Terminal
    /// sessions are left alone.
    pub fn evaluate(&self, session: &mut Session, now: DateTime<Utc>) -> TimeoutDisposition {
        if session.is_terminal() {
            return TimeoutDisposition::Unchanged;
        }
        if session.age_seconds(now) > self.session_timeout_seconds {
            session.expire();
            return TimeoutDisposition::Expired(ExpiryCause::MaxAge);
        }
        if session.idle_seconds(now) > self.inactivity_timeout_seconds {
            session.expire();
            return TimeoutDisposition::Expired(ExpiryCause::Inactivity);
        }
        if session.seconds_since_reauthentication(now) > self.reauth_timeout_seconds {
            session.add_reauth_reason(ReauthReason::SessionTimeout);
            return TimeoutDisposition::ReauthenticationDue;
        }
        TimeoutDisposition::Unchanged
    }

    /// Seconds of absolute lifetime left, clamped to zero.
    pub fn remaining_session_seconds(&self, session: &Session, now: DateTime<Utc>) -> i64 {
        (self.session_timeout_seconds - session.age_seconds(now)).max(0)
    }

    /// Seconds of inactivity allowance left, clamped to zero.
    pub fn remaining_inactivity_seconds(&self, session: &Session, now: DateTime<Utc>) -> i64 {
        (self.inactivity_timeout_seconds - session.idle_seconds(now)).max(0)
    }

    /// Seconds until the re-authentication timeout triggers, clamped to
    /// zero.
    pub fn seconds_until_reauthentication(&self, session: &Session, now: DateTime<Utc>) -> i64 {
        (self.reauth_timeout_seconds - session.seconds_since_reauthentication(now)).max(0)
    }
}
