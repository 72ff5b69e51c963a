//! Session lifecycle: creation under concurrent limits, renewal, id
//! regeneration, re-authentication refresh, and termination.

use std::sync::Arc;

use chrono::Utc;

use crate::error::AuthError;
use crate::models::session::{Session, SessionState};
use crate::storage::SessionStore;
use crate::utils::token::generate_session_id;

pub struct SessionLifecycle {
    store: Arc<dyn SessionStore>,
    max_concurrent_sessions: usize,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn SessionStore>, max_concurrent_sessions: usize) -> Self {
        Self {
            store,
            max_concurrent_sessions: max_concurrent_sessions.max(1),
        }
    }

    pub fn max_concurrent_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }

    /// Creates a fresh ACTIVE session. Fails when the user already holds as
    /// many live sessions as the configured limit.
    pub fn create(
        &self,
        user_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Session, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::InvalidArgument(
                "user id must not be empty".into(),
            ));
        }
        let mut session = Session::new(generate_session_id(), user_id, Utc::now());
        session.ip_address = ip_address.map(str::to_string);
        session.user_agent = user_agent.map(str::to_string);
        match self
            .store
            .insert_bounded(session.clone(), self.max_concurrent_sessions)
        {
            Ok(()) => {
                tracing::debug!(user_id, session_id = %session.session_id, "session created");
                Ok(session)
            }
            Err(crate::error::StorageError::LimitExceeded(_)) => {
                tracing::warn!(
                    user_id,
                    limit = self.max_concurrent_sessions,
                    "session creation refused"
                );
                Err(AuthError::ConcurrentLimitExceeded(user_id.to_string()))
            }
            Err(fault) => Err(fault.into()),
        }
    }

    /// Renews a live session: bumps `last_accessed` and the access counter.
    /// EXPIRED and TERMINATED sessions reject.
    pub fn renew(&self, session_id: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let mut renewed = false;
        let updated = self.store.modify(session_id, &mut |session| {
            if session.is_live() {
                session.touch(now);
                renewed = true;
            }
        })?;
        match updated {
            None => Err(AuthError::SessionNotFound(session_id.to_string())),
            Some(session) if renewed => Ok(session),
            Some(session) => Err(AuthError::InvalidState(format!(
                "session '{}' is {} and cannot be renewed",
                session_id,
                session.state.as_str()
            ))),
        }
    }

    /// Issues a new session id for an existing session. The new record
    /// inherits state, addresses, both attribute maps, and the counters;
    /// `created_at` restarts. The old id stops resolving once this returns.
    pub fn regenerate_id(&self, session_id: &str) -> Result<Session, AuthError> {
        let old = self
            .store
            .find(session_id)?
            .ok_or_else(|| AuthError::SessionNotFound(session_id.to_string()))?;

        let mut renewed = old.clone();
        renewed.session_id = generate_session_id();
        renewed.created_at = Utc::now();
        self.store.replace(session_id, renewed.clone())?;
        tracing::debug!(
            old_id = session_id,
            new_id = %renewed.session_id,
            "session id regenerated"
        );
        Ok(renewed)
    }

    /// Clears pending re-authentication reasons after the principal proved
    /// their identity again; REQUIRES_REAUTH transitions back to ACTIVE.
    pub fn refresh_after_reauthentication(&self, session_id: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let mut refreshed = false;
        let updated = self.store.modify(session_id, &mut |session| {
            if !session.is_terminal() {
                session.clear_reauth_reasons();
                session.last_reauthentication = now;
                refreshed = true;
            }
        })?;
        match updated {
            None => Err(AuthError::SessionNotFound(session_id.to_string())),
            Some(session) if refreshed => Ok(session),
            Some(session) => Err(AuthError::InvalidState(format!(
                "session '{}' is {} and cannot be refreshed",
                session_id,
                session.state.as_str()
            ))),
        }
    }

    /// Flips the session to TERMINATED, retaining the record. Returns
    /// whether a session existed.
    pub fn terminate(&self, session_id: &str) -> Result<bool, AuthError> {
        let updated = self
            .store
            .modify(session_id, &mut |session| session.terminate())?;
        Ok(updated.is_some())
    }

    /// Removes the record entirely.
    pub fn delete(&self, session_id: &str) -> Result<bool, AuthError> {
        Ok(self.store.delete(session_id)?)
    }

    /// Terminates every non-terminated session of the user except `keep_id`;
    /// returns how many were terminated.
    pub fn terminate_all_except(&self, user_id: &str, keep_id: &str) -> Result<usize, AuthError> {
        let mut terminated = 0;
        for session in self.store.sessions_for_user(user_id)? {
            if session.session_id == keep_id || session.state == SessionState::Terminated {
                continue;
            }
            self.store
                .modify(&session.session_id, &mut |session| session.terminate())?;
            terminated += 1;
        }
        Ok(terminated)
    }

    /// Terminates every non-terminated session of the user.
    pub fn terminate_all(&self, user_id: &str) -> Result<usize, AuthError> {
        self.terminate_all_except(user_id, "")
    }

    /// When the user's live count has reached the limit, terminates the
    /// oldest live session (smallest `created_at`, ties broken by id) and
    /// returns its id.
    pub fn terminate_oldest_if_limit_exceeded(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, AuthError> {
        let mut live: Vec<Session> = self
            .store
            .sessions_for_user(user_id)?
            .into_iter()
            .filter(Session::is_live)
            .collect();
        if live.len() < self.max_concurrent_sessions {
            return Ok(None);
        }
        live.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        let oldest = live.remove(0);
        self.terminate(&oldest.session_id)?;
        tracing::debug!(user_id, session_id = %oldest.session_id, "oldest session terminated to honor limit");
        Ok(Some(oldest.session_id))
    }

    /// Housekeeping sweep removing EXPIRED and TERMINATED records.
    pub fn purge_terminated(&self) -> Result<usize, AuthError> {
        Ok(self.store.purge_terminated()?)
    }
}
