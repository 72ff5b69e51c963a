//! Session entity and its lifecycle state machine.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Lifecycle states of a session. TERMINATED and EXPIRED are terminal.
pub enum SessionState {
    Active,
    RequiresReauth,
    Expired,
    Terminated,
    Suspended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::RequiresReauth => "requires_reauth",
            SessionState::Expired => "expired",
            SessionState::Terminated => "terminated",
            SessionState::Suspended => "suspended",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
/// Enumerated causes requiring the principal to prove identity again
/// without invalidating the session.
pub enum ReauthReason {
    SessionTimeout,
    PrivilegeEscalation,
    RoleChange,
    SecurityAttributeChange,
    OrganizationDefined,
    SuspiciousActivity,
    ManualRequest,
    SessionRenewal,
}

impl ReauthReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReauthReason::SessionTimeout => "session_timeout",
            ReauthReason::PrivilegeEscalation => "privilege_escalation",
            ReauthReason::RoleChange => "role_change",
            ReauthReason::SecurityAttributeChange => "security_attribute_change",
            ReauthReason::OrganizationDefined => "organization_defined",
            ReauthReason::SuspiciousActivity => "suspicious_activity",
            ReauthReason::ManualRequest => "manual_request",
            ReauthReason::SessionRenewal => "session_renewal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Server-side record of an ongoing authenticated interaction.
pub struct Session {
    /// High-entropy, URL-safe session id.
    pub session_id: String,
    /// The authenticated subject the session belongs to.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub last_reauthentication: DateTime<Utc>,
    pub state: SessionState,
    pub access_count: u64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Application attributes; opaque to the core.
    pub attributes: HashMap<String, Value>,
    /// Security-relevant attributes kept apart from application data.
    pub security_attributes: HashMap<String, Value>,
    pub pending_reauth_reasons: BTreeSet<ReauthReason>,
}

impl Session {
    /// Constructs a fresh ACTIVE session with all timestamps set to `now`.
    pub fn new(session_id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id: user_id.to_string(),
            created_at: now,
            last_accessed: now,
            last_reauthentication: now,
            state: SessionState::Active,
            access_count: 0,
            ip_address: None,
            user_agent: None,
            attributes: HashMap::new(),
            security_attributes: HashMap::new(),
            pending_reauth_reasons: BTreeSet::new(),
        }
    }

    /// ACTIVE or REQUIRES_REAUTH; the states counted against concurrent
    /// session limits.
    pub fn is_live(&self) -> bool {
        matches!(
            self.state,
            SessionState::Active | SessionState::RequiresReauth
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Expired | SessionState::Terminated)
    }

    /// Holds exactly when the state is REQUIRES_REAUTH or any reason is
    /// pending.
    pub fn requires_reauthentication(&self) -> bool {
        self.state == SessionState::RequiresReauth || !self.pending_reauth_reasons.is_empty()
    }

    /// Records a pending re-authentication reason. Adding a reason while
    /// ACTIVE moves the session to REQUIRES_REAUTH. Terminal sessions are
    /// left untouched and `false` is returned.
    pub fn add_reauth_reason(&mut self, reason: ReauthReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.pending_reauth_reasons.insert(reason);
        if self.state == SessionState::Active {
            self.state = SessionState::RequiresReauth;
        }
        true
    }

    /// Clears every pending reason; REQUIRES_REAUTH transitions back to
    /// ACTIVE.
    pub fn clear_reauth_reasons(&mut self) {
        self.pending_reauth_reasons.clear();
        if self.state == SessionState::RequiresReauth {
            self.state = SessionState::Active;
        }
    }

    /// Records an access: bumps `last_accessed` and the access counter.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Moves a non-terminal session to EXPIRED.
    pub fn expire(&mut self) {
        if !self.is_terminal() {
            self.state = SessionState::Expired;
        }
    }

    /// Moves the session to TERMINATED. Idempotent.
    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
    }

    /// Moves a live session to SUSPENDED.
    pub fn suspend(&mut self) {
        if self.is_live() {
            self.state = SessionState::Suspended;
        }
    }

    /// Positive age in seconds since creation.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    /// Seconds since the last access.
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_accessed).num_seconds()
    }

    /// Seconds since the principal last proved their identity.
    pub fn seconds_since_reauthentication(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_reauthentication).num_seconds()
    }

    pub fn set_attribute(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_security_attribute(&mut self, key: &str, value: Value) {
        self.security_attributes.insert(key.to_string(), value);
    }

    pub fn security_attribute(&self, key: &str) -> Option<&Value> {
        self.security_attributes.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> Session {
        Session::new("sess-1".into(), "alice", Utc::now())
    }

    #[test]
    fn new_session_starts_active_with_zero_accesses() {
        let s = session();
        assert_eq!(s.state, SessionState::Active);
        assert_eq!(s.access_count, 0);
        assert!(s.is_live());
        assert!(!s.requires_reauthentication());
        assert_eq!(s.created_at, s.last_accessed);
        assert_eq!(s.created_at, s.last_reauthentication);
    }

    #[test]
    fn adding_reason_moves_active_to_requires_reauth() {
        let mut s = session();
        assert!(s.add_reauth_reason(ReauthReason::PrivilegeEscalation));
        assert_eq!(s.state, SessionState::RequiresReauth);
        assert!(s.requires_reauthentication());
    }

    #[test]
    fn clearing_all_reasons_returns_to_active() {
        let mut s = session();
        s.add_reauth_reason(ReauthReason::RoleChange);
        s.add_reauth_reason(ReauthReason::ManualRequest);
        s.clear_reauth_reasons();
        assert_eq!(s.state, SessionState::Active);
        assert!(!s.requires_reauthentication());
        assert!(s.pending_reauth_reasons.is_empty());
    }

    #[test]
    fn terminal_states_reject_reauth_reasons() {
        let mut s = session();
        s.terminate();
        assert!(!s.add_reauth_reason(ReauthReason::SuspiciousActivity));
        assert_eq!(s.state, SessionState::Terminated);
        assert!(s.pending_reauth_reasons.is_empty());

        let mut s = session();
        s.expire();
        assert!(!s.add_reauth_reason(ReauthReason::SessionTimeout));
        assert_eq!(s.state, SessionState::Expired);
    }

    #[test]
    fn expired_session_cannot_be_resurrected_by_expire() {
        let mut s = session();
        s.terminate();
        s.expire();
        assert_eq!(s.state, SessionState::Terminated);
    }

    #[test]
    fn touch_bumps_access_count_and_timestamp() {
        let mut s = session();
        let later = s.created_at + Duration::seconds(30);
        s.touch(later);
        assert_eq!(s.access_count, 1);
        assert_eq!(s.last_accessed, later);
    }

    #[test]
    fn age_is_positive_seconds_since_creation() {
        let s = session();
        let later = s.created_at + Duration::seconds(90);
        assert_eq!(s.age_seconds(later), 90);
        assert_eq!(s.idle_seconds(later), 90);
    }

    #[test]
    fn attribute_maps_are_independent() {
        let mut s = session();
        s.set_attribute("key1", Value::String("value1".into()));
        s.set_security_attribute("role", Value::String("admin".into()));
        assert_eq!(s.attribute("key1"), Some(&Value::String("value1".into())));
        assert_eq!(
            s.security_attribute("role"),
            Some(&Value::String("admin".into()))
        );
        assert!(s.attribute("role").is_none());
        assert!(s.security_attribute("key1").is_none());
    }

    #[test]
    fn requires_reauth_invariant_holds_for_reason_set() {
        let mut s = session();
        s.add_reauth_reason(ReauthReason::SecurityAttributeChange);
        assert_eq!(
            s.requires_reauthentication(),
            s.state == SessionState::RequiresReauth || !s.pending_reauth_reasons.is_empty()
        );
        s.clear_reauth_reasons();
        assert_eq!(
            s.requires_reauthentication(),
            s.state == SessionState::RequiresReauth || !s.pending_reauth_reasons.is_empty()
        );
    }
}
