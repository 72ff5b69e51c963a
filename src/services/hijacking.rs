//! Session-hijacking prevention: origin binding, anomaly detection, and
//! session-id rotation.

use chrono::{DateTime, Utc};

use crate::models::session::Session;
use crate::utils::token::generate_session_id;

/// A never-touched session older than this is treated as a fixation
/// candidate.
pub const FIXATION_IDLE_SECS: i64 = 300;

/// Access counts beyond this mark a session as anomalous regardless of
/// origin.
const SUSPICIOUS_ACCESS_COUNT: u64 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct HijackingPrevention {
    enforce_ip_binding: bool,
    enforce_user_agent_binding: bool,
    max_concurrent_sessions: usize,
}

impl HijackingPrevention {
    pub fn new(
        enforce_ip_binding: bool,
        enforce_user_agent_binding: bool,
        max_concurrent_sessions: usize,
    ) -> Self {
        Self {
            enforce_ip_binding,
            enforce_user_agent_binding,
            max_concurrent_sessions,
        }
    }

    /// Checks the request origin against the values bound at session
    /// creation. A check is skipped when binding is not enforced or the
    /// session never stored the value.
    pub fn validate_session_binding(
        &self,
        session: &Session,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> bool {
        if self.enforce_ip_binding {
            if let Some(stored) = session.ip_address.as_deref() {
                if ip_address != Some(stored) {
                    tracing::warn!(
                        session_id = %session.session_id,
                        stored,
                        presented = ?ip_address,
                        "session IP binding violated"
                    );
                    return false;
                }
            }
        }
        if self.enforce_user_agent_binding {
            if let Some(stored) = session.user_agent.as_deref() {
                if user_agent != Some(stored) {
                    tracing::warn!(
                        session_id = %session.session_id,
                        "session user-agent binding violated"
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Flags an IP change that leaves the stored /24, and independently an
    /// implausibly high access count.
    pub fn detect_suspicious_activity(&self, session: &Session, ip_address: &str) -> bool {
        if let Some(stored) = session.ip_address.as_deref() {
            if stored != ip_address && !same_subnet(stored, ip_address) {
                return true;
            }
        }
        session.access_count > SUSPICIOUS_ACCESS_COUNT
    }

    /// A session that was never accessed yet has been idle beyond the
    /// fixation threshold is suspicious.
    pub fn detect_session_fixation(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.access_count == 0 && session.idle_seconds(now) > FIXATION_IDLE_SECS
    }

    pub fn is_concurrent_session_limit_exceeded(&self, live_count: usize) -> bool {
        live_count >= self.max_concurrent_sessions
    }

    /// Draws a fresh session id. The caller is responsible for swapping the
    /// stored session.
    pub fn regenerate_session_id(&self) -> String {
        generate_session_id()
    }
}

/// First three dotted octets equal. Anything that is not dotted-quad
/// shaped never matches.
fn same_subnet(a: &str, b: &str) -> bool {
    let a_octets: Vec<&str> = a.split('.').collect();
    let b_octets: Vec<&str> = b.split('.').collect();
    a_octets.len() == 4 && b_octets.len() == 4 && a_octets[..3] == b_octets[..3]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bound_session() -> Session {
        let mut session = Session::new("sess-1".into(), "alice", Utc::now());
        session.ip_address = Some("192.168.1.100".into());
        session.user_agent = Some("Mozilla/5.0".into());
        session
    }

    fn prevention() -> HijackingPrevention {
        HijackingPrevention::new(true, true, 3)
    }

    #[test]
    fn matching_binding_passes() {
        let session = bound_session();
        assert!(prevention().validate_session_binding(
            &session,
            Some("192.168.1.100"),
            Some("Mozilla/5.0")
        ));
    }

    #[test]
    fn ip_mismatch_fails_binding() {
        let session = bound_session();
        assert!(!prevention().validate_session_binding(
            &session,
            Some("192.168.1.200"),
            Some("Mozilla/5.0")
        ));
    }

    #[test]
    fn user_agent_mismatch_fails_binding() {
        let session = bound_session();
        assert!(!prevention().validate_session_binding(
            &session,
            Some("192.168.1.100"),
            Some("curl/8.0")
        ));
    }

    #[test]
    fn absent_stored_values_skip_their_checks() {
        let mut session = bound_session();
        session.ip_address = None;
        session.user_agent = None;
        assert!(prevention().validate_session_binding(&session, Some("10.0.0.1"), None));
    }

    #[test]
    fn binding_checks_can_be_disabled() {
        let session = bound_session();
        let lax = HijackingPrevention::new(false, false, 3);
        assert!(lax.validate_session_binding(&session, Some("10.0.0.1"), Some("curl/8.0")));
    }

    #[test]
    fn cross_subnet_ip_change_is_suspicious() {
        let session = bound_session();
        assert!(prevention().detect_suspicious_activity(&session, "10.0.0.1"));
        // Same /24 is tolerated by the anomaly detector.
        assert!(!prevention().detect_suspicious_activity(&session, "192.168.1.200"));
        assert!(!prevention().detect_suspicious_activity(&session, "192.168.1.100"));
    }

    #[test]
    fn runaway_access_count_is_suspicious() {
        let mut session = bound_session();
        session.access_count = 1001;
        assert!(prevention().detect_suspicious_activity(&session, "192.168.1.100"));
        session.access_count = 1000;
        assert!(!prevention().detect_suspicious_activity(&session, "192.168.1.100"));
    }

    #[test]
    fn untouched_old_session_reads_as_fixation() {
        let session = bound_session();
        let now = session.created_at + Duration::seconds(301);
        assert!(prevention().detect_session_fixation(&session, now));

        let fresh = session.created_at + Duration::seconds(30);
        assert!(!prevention().detect_session_fixation(&session, fresh));
    }

    #[test]
    fn accessed_session_is_never_a_fixation_candidate() {
        let mut session = bound_session();
        let later = session.created_at + Duration::seconds(10);
        session.touch(later);
        let now = session.created_at + Duration::seconds(10_000);
        assert!(!prevention().detect_session_fixation(&session, now));
    }

    #[test]
    fn limit_check_is_inclusive() {
        let prevention = prevention();
        assert!(!prevention.is_concurrent_session_limit_exceeded(2));
        assert!(prevention.is_concurrent_session_limit_exceeded(3));
        assert!(prevention.is_concurrent_session_limit_exceeded(4));
    }

    #[test]
    fn regenerated_ids_are_fresh() {
        let prevention = prevention();
        let a = prevention.regenerate_session_id();
        let b = prevention.regenerate_session_id();
        assert_ne!(a, b);
        assert!(a.len() > 20);
    }

    #[test]
    fn subnet_comparison_requires_dotted_quads() {
        assert!(same_subnet("192.168.1.100", "192.168.1.200"));
        assert!(!same_subnet("192.168.1.100", "192.168.2.100"));
        assert!(!same_subnet("::1", "::1"));
        assert!(!same_subnet("not-an-ip", "not-an-ip"));
    }
}
