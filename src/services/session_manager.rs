//! Session orchestrator: the single entry point higher layers use for
//! session access. Every read applies the timeout rules; every validated
//! access applies hijacking prevention.

use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::error::AuthError;
use crate::models::session::{ReauthReason, Session};
use crate::services::audit_log::{SecurityEvent, SecurityEventLog};
use crate::services::hijacking::HijackingPrevention;
use crate::services::reauth::{ReauthenticationPolicy, SessionTimeoutManager, TimeoutDisposition};
use crate::services::session_lifecycle::SessionLifecycle;
use crate::storage::SessionStore;

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifecycle: SessionLifecycle,
    timeouts: SessionTimeoutManager,
    reauth_policy: ReauthenticationPolicy,
    hijacking: HijackingPrevention,
    events: Arc<SecurityEventLog>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        let lifecycle = SessionLifecycle::new(store.clone(), config.max_concurrent_sessions);
        let timeouts = SessionTimeoutManager::new(
            config.session_timeout_seconds(),
            config.inactivity_timeout_seconds,
            config.reauth_timeout_seconds,
        );
        let reauth_policy = ReauthenticationPolicy::new(config.reauth_timeout_seconds);
        let hijacking = HijackingPrevention::new(
            config.enforce_ip_binding,
            config.enforce_user_agent_binding,
            config.max_concurrent_sessions,
        );
        let events = Arc::new(SecurityEventLog::new(config.enable_audit_logging));
        Self {
            store,
            lifecycle,
            timeouts,
            reauth_policy,
            hijacking,
            events,
        }
    }

    pub fn events(&self) -> &SecurityEventLog {
        &self.events
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn create_session(
        &self,
        user_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Session, AuthError> {
        match self.lifecycle.create(user_id, ip_address, user_agent) {
            Ok(session) => {
                self.events.record(SecurityEvent::SessionCreated {
                    session_id: session.session_id.clone(),
                    user_id: user_id.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(session)
            }
            Err(fault @ AuthError::ConcurrentLimitExceeded(_)) => {
                self.events.record(SecurityEvent::ConcurrentLimitExceeded {
                    user_id: user_id.to_string(),
                    limit: self.lifecycle.max_concurrent_sessions(),
                    timestamp: Utc::now(),
                });
                Err(fault)
            }
            Err(fault) => Err(fault),
        }
    }

    /// Fetches a session, applying the timeout rules on read. Sessions that
    /// turn out invalid transition to EXPIRED and `None` is returned; a
    /// stale re-authentication deadline is persisted as a pending reason
    /// but the session is still handed back.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        let Some(mut session) = self.store.find(session_id)? else {
            return Ok(None);
        };
        if session.is_terminal() {
            return Ok(None);
        }

        match self.timeouts.evaluate(&mut session, Utc::now()) {
            TimeoutDisposition::Expired(cause) => {
                self.store.save(session.clone())?;
                self.events.record(SecurityEvent::SessionExpired {
                    session_id: session.session_id.clone(),
                    cause: cause.as_str().to_string(),
                    timestamp: Utc::now(),
                });
                tracing::debug!(session_id, cause = cause.as_str(), "session expired on read");
                Ok(None)
            }
            TimeoutDisposition::ReauthenticationDue => {
                self.store.save(session.clone())?;
                Ok(Some(session))
            }
            TimeoutDisposition::Unchanged => Ok(Some(session)),
        }
    }

    /// Liveness plus origin binding. Suspicious-but-bound access keeps the
    /// session valid while raising the SUSPICIOUS_ACTIVITY reason.
    pub fn validate_session(
        &self,
        session_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<bool, AuthError> {
        let Some(session) = self.get_session(session_id)? else {
            return Ok(false);
        };

        if !self
            .hijacking
            .validate_session_binding(&session, ip_address, user_agent)
        {
            self.events.record(SecurityEvent::HijackingAttempt {
                session_id: session.session_id.clone(),
                presented_ip: ip_address.map(str::to_string),
                timestamp: Utc::now(),
            });
            return Ok(false);
        }

        if let Some(ip) = ip_address {
            if self.hijacking.detect_suspicious_activity(&session, ip) {
                self.events.record(SecurityEvent::SuspiciousActivity {
                    session_id: session.session_id.clone(),
                    ip: ip.to_string(),
                    timestamp: Utc::now(),
                });
                self.trigger_reauthentication(session_id, ReauthReason::SuspiciousActivity)?;
            }
        }
        Ok(true)
    }

    /// Records an access on a live session.
    pub fn touch(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        if self.get_session(session_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.lifecycle.renew(session_id)?))
    }

    /// Adds a pending re-authentication reason.
    pub fn trigger_reauthentication(
        &self,
        session_id: &str,
        reason: ReauthReason,
    ) -> Result<(), AuthError> {
        let mut added = false;
        let updated = self.store.modify(session_id, &mut |session| {
            added = session.add_reauth_reason(reason);
        })?;
        match updated {
            None => Err(AuthError::SessionNotFound(session_id.to_string())),
            Some(session) if added => {
                self.events.record(SecurityEvent::ReauthenticationRequired {
                    session_id: session.session_id.clone(),
                    reason,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Some(session) => Err(AuthError::InvalidState(format!(
                "session '{}' is {} and cannot demand re-authentication",
                session_id,
                session.state.as_str()
            ))),
        }
    }

    /// Clears pending reasons after the principal proved their identity.
    pub fn mark_reauthenticated(&self, session_id: &str) -> Result<Session, AuthError> {
        self.lifecycle.refresh_after_reauthentication(session_id)
    }

    /// Whether the session must re-authenticate, by pending reasons or the
    /// re-authentication timeout.
    pub fn requires_reauthentication(&self, session_id: &str) -> Result<bool, AuthError> {
        let session = self
            .store
            .find(session_id)?
            .ok_or_else(|| AuthError::SessionNotFound(session_id.to_string()))?;
        Ok(self
            .reauth_policy
            .requires_reauthentication(&session, Utc::now()))
    }

    /// Swaps the session id, preserving all session state.
    pub fn regenerate_session_id(&self, session_id: &str) -> Result<Session, AuthError> {
        self.lifecycle.regenerate_id(session_id)
    }

    pub fn terminate_session(&self, session_id: &str) -> Result<bool, AuthError> {
        let existed = self.lifecycle.terminate(session_id)?;
        if existed {
            self.events.record(SecurityEvent::SessionTerminated {
                session_id: session_id.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(existed)
    }

    pub fn terminate_all_user_sessions(&self, user_id: &str) -> Result<usize, AuthError> {
        let terminated = self.lifecycle.terminate_all(user_id)?;
        tracing::debug!(user_id, terminated, "terminated all user sessions");
        Ok(terminated)
    }

    pub fn active_session_count(&self, user_id: &str) -> Result<usize, AuthError> {
        Ok(self.store.count_live_for_user(user_id)?)
    }
}
