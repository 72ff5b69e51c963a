//! In-memory store implementations backed by concurrent maps.
//!
//! Each map entry is one identifier (or one session); `entry`/`get_mut`
//! guards give the per-key exclusivity the compound operations need. No
//! hashing ever happens while a guard is held.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

use crate::error::StorageError;
use crate::models::authenticator::{
    Authenticator, AuthenticatorKind, AuthenticatorStatus, AuthenticatorType,
};
use crate::models::policy::LockoutPolicy;
use crate::models::session::Session;
use crate::storage::{AuthenticatorStore, LoginFailureState, SessionStore};

#[derive(Debug, Default)]
struct IdentifierRecord {
    /// One authenticator per type.
    authenticators: HashMap<AuthenticatorType, Authenticator>,
    /// Retained password hashes, most recent last.
    password_history: Vec<String>,
    /// Failed-attempt instants inside (or near) the lockout window.
    attempt_timestamps: Vec<DateTime<Utc>>,
}

/// Authenticator storage over a concurrent map keyed by identifier.
#[derive(Debug, Default)]
pub struct InMemoryAuthenticatorStore {
    records: DashMap<String, IdentifierRecord>,
}

impl InMemoryAuthenticatorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthenticatorStore for InMemoryAuthenticatorStore {
    fn insert(&self, authenticator: Authenticator) -> Result<(), StorageError> {
        let kind = authenticator.authenticator_type();
        let mut entry = self
            .records
            .entry(authenticator.identifier.clone())
            .or_default();
        if entry.authenticators.contains_key(&kind) {
            return Err(StorageError::Duplicate(format!(
                "{} authenticator for '{}'",
                kind, authenticator.identifier
            )));
        }
        entry.authenticators.insert(kind, authenticator);
        Ok(())
    }

    fn find(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> Result<Option<Authenticator>, StorageError> {
        Ok(self
            .records
            .get(identifier)
            .and_then(|record| record.authenticators.get(&kind).cloned()))
    }

    fn save(&self, authenticator: Authenticator) -> Result<(), StorageError> {
        let kind = authenticator.authenticator_type();
        let mut entry = self.records.get_mut(&authenticator.identifier).ok_or_else(|| {
            StorageError::NotFound(format!(
                "{} authenticator for '{}'",
                kind, authenticator.identifier
            ))
        })?;
        if !entry.authenticators.contains_key(&kind) {
            return Err(StorageError::NotFound(format!(
                "{} authenticator for '{}'",
                kind, authenticator.identifier
            )));
        }
        entry.authenticators.insert(kind, authenticator);
        Ok(())
    }

    fn remove(&self, identifier: &str, kind: AuthenticatorType) -> Result<bool, StorageError> {
        Ok(self
            .records
            .get_mut(identifier)
            .map(|mut record| record.authenticators.remove(&kind).is_some())
            .unwrap_or(false))
    }

    fn list(&self, identifier: &str) -> Result<Vec<Authenticator>, StorageError> {
        let mut all: Vec<Authenticator> = self
            .records
            .get(identifier)
            .map(|record| record.authenticators.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|a| a.authenticator_type());
        Ok(all)
    }

    fn push_history(
        &self,
        identifier: &str,
        hash: &str,
        limit: usize,
    ) -> Result<(), StorageError> {
        let mut entry = self.records.entry(identifier.to_string()).or_default();
        entry.password_history.push(hash.to_string());
        trim_history(&mut entry.password_history, limit);
        Ok(())
    }

    fn password_history(
        &self,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .get(identifier)
            .map(|record| {
                let history = &record.password_history;
                let start = history.len().saturating_sub(limit);
                history[start..].to_vec()
            })
            .unwrap_or_default())
    }

    fn update_password(
        &self,
        identifier: &str,
        new_hash: &str,
        expires_at: Option<DateTime<Utc>>,
        history_limit: usize,
    ) -> Result<Authenticator, StorageError> {
        let mut entry = self.records.get_mut(identifier).ok_or_else(|| {
            StorageError::NotFound(format!("password authenticator for '{}'", identifier))
        })?;
        let IdentifierRecord {
            authenticators,
            password_history,
            attempt_timestamps,
        } = entry.value_mut();

        let auth = authenticators
            .get_mut(&AuthenticatorType::Password)
            .ok_or_else(|| {
                StorageError::NotFound(format!("password authenticator for '{}'", identifier))
            })?;

        let now = Utc::now();
        match &mut auth.kind {
            AuthenticatorKind::Password {
                password_hash,
                failed_attempts,
                locked_until,
                lockout_count,
            } => {
                *password_hash = new_hash.to_string();
                *failed_attempts = 0;
                *locked_until = None;
                *lockout_count = 0;
            }
            _ => {
                return Err(StorageError::Backend(format!(
                    "record for '{}' holds a non-password payload under the password key",
                    identifier
                )))
            }
        }
        auth.status = AuthenticatorStatus::Active;
        auth.expires_at = expires_at;
        auth.updated_at = now;

        password_history.push(new_hash.to_string());
        trim_history(password_history, history_limit);
        attempt_timestamps.clear();

        Ok(auth.clone())
    }

    fn record_login_failure(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
        policy: LockoutPolicy,
    ) -> Result<LoginFailureState, StorageError> {
        let Some(mut entry) = self.records.get_mut(identifier) else {
            return Ok(LoginFailureState::empty());
        };
        let IdentifierRecord {
            authenticators,
            attempt_timestamps,
            ..
        } = entry.value_mut();
        let Some(auth) = authenticators.get_mut(&AuthenticatorType::Password) else {
            return Ok(LoginFailureState::empty());
        };

        let (state, lock_now) = match &mut auth.kind {
            AuthenticatorKind::Password {
                failed_attempts,
                locked_until,
                lockout_count,
                ..
            } => {
                // A still-standing lockout absorbs further failures.
                if locked_until.map(|until| until > now).unwrap_or(false) {
                    return Ok(LoginFailureState {
                        failed_attempts: *failed_attempts,
                        locked_until: *locked_until,
                        lockout_count: *lockout_count,
                        became_locked: false,
                    });
                }

                attempt_timestamps.push(now);
                let window = chrono::Duration::minutes(policy.window_minutes.max(0));
                attempt_timestamps.retain(|t| now.signed_duration_since(*t) <= window);
                let in_window = attempt_timestamps.len() as u32;

                if in_window >= policy.threshold.max(1) {
                    let next_lockout_count = *lockout_count + 1;
                    let duration = policy.duration_minutes_for(next_lockout_count);
                    let until = now + chrono::Duration::minutes(duration);
                    *failed_attempts = in_window;
                    *locked_until = Some(until);
                    *lockout_count = next_lockout_count;
                    (
                        LoginFailureState {
                            failed_attempts: in_window,
                            locked_until: Some(until),
                            lockout_count: next_lockout_count,
                            became_locked: true,
                        },
                        true,
                    )
                } else {
                    *failed_attempts = in_window;
                    (
                        LoginFailureState {
                            failed_attempts: in_window,
                            locked_until: None,
                            lockout_count: *lockout_count,
                            became_locked: false,
                        },
                        false,
                    )
                }
            }
            _ => return Ok(LoginFailureState::empty()),
        };

        if lock_now {
            auth.status = AuthenticatorStatus::Locked;
        }
        auth.updated_at = now;
        Ok(state)
    }

    fn clear_login_failures(&self, identifier: &str) -> Result<(), StorageError> {
        let Some(mut entry) = self.records.get_mut(identifier) else {
            return Ok(());
        };
        let IdentifierRecord {
            authenticators,
            attempt_timestamps,
            ..
        } = entry.value_mut();
        attempt_timestamps.clear();

        if let Some(auth) = authenticators.get_mut(&AuthenticatorType::Password) {
            if let AuthenticatorKind::Password {
                failed_attempts,
                locked_until,
                lockout_count,
                ..
            } = &mut auth.kind
            {
                *failed_attempts = 0;
                *locked_until = None;
                *lockout_count = 0;
            }
            if auth.status == AuthenticatorStatus::Locked {
                auth.status = AuthenticatorStatus::Active;
            }
        }
        Ok(())
    }

    fn clear_elapsed_lockout(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Authenticator>, StorageError> {
        let Some(mut entry) = self.records.get_mut(identifier) else {
            return Ok(None);
        };
        let IdentifierRecord {
            authenticators,
            attempt_timestamps,
            ..
        } = entry.value_mut();
        let Some(auth) = authenticators.get_mut(&AuthenticatorType::Password) else {
            return Ok(None);
        };

        let mut elapsed = false;
        if let AuthenticatorKind::Password {
            failed_attempts,
            locked_until,
            ..
        } = &mut auth.kind
        {
            if let Some(until) = *locked_until {
                if now > until {
                    *locked_until = None;
                    *failed_attempts = 0;
                    elapsed = true;
                }
            }
        }
        if elapsed {
            attempt_timestamps.clear();
            if auth.status == AuthenticatorStatus::Locked {
                auth.status = AuthenticatorStatus::Active;
            }
            auth.updated_at = now;
        }
        Ok(Some(auth.clone()))
    }
}

fn trim_history(history: &mut Vec<String>, limit: usize) {
    while history.len() > limit {
        history.remove(0);
    }
}

/// Session storage over a concurrent map keyed by session id.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    /// Per-user guard entries serializing bounded inserts. Entries are
    /// never removed; the map is bounded by the user population.
    user_guards: DashMap<String, ()>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) -> Result<(), StorageError> {
        match self.sessions.entry(session.session_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StorageError::Duplicate(format!(
                "session '{}'",
                session.session_id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    fn insert_bounded(&self, session: Session, limit: usize) -> Result<(), StorageError> {
        // Holding the user's guard entry makes check-and-reserve atomic per
        // user; creations for other users proceed in parallel.
        let _guard = self
            .user_guards
            .entry(session.user_id.clone())
            .or_insert(());
        let live = self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == session.user_id && entry.is_live())
            .count();
        if live >= limit {
            return Err(StorageError::LimitExceeded(format!(
                "user '{}' already holds {} live sessions",
                session.user_id, live
            )));
        }
        self.insert(session)
    }

    fn find(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    fn save(&self, session: Session) -> Result<(), StorageError> {
        let mut existing = self
            .sessions
            .get_mut(&session.session_id)
            .ok_or_else(|| StorageError::NotFound(format!("session '{}'", session.session_id)))?;
        *existing = session;
        Ok(())
    }

    fn modify(
        &self,
        session_id: &str,
        mutate: &mut dyn FnMut(&mut Session),
    ) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get_mut(session_id).map(|mut session| {
            mutate(&mut *session);
            session.clone()
        }))
    }

    fn delete(&self, session_id: &str) -> Result<bool, StorageError> {
        Ok(self.sessions.remove(session_id).is_some())
    }

    fn replace(&self, old_id: &str, session: Session) -> Result<(), StorageError> {
        if old_id == session.session_id {
            return self.save(session);
        }
        if !self.sessions.contains_key(old_id) {
            return Err(StorageError::NotFound(format!("session '{}'", old_id)));
        }
        // Insert first so the session is never observably absent.
        self.sessions
            .insert(session.session_id.clone(), session);
        self.sessions.remove(old_id);
        Ok(())
    }

    fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect())
    }

    fn count_live_for_user(&self, user_id: &str) -> Result<usize, StorageError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.is_live())
            .count())
    }

    fn purge_terminated(&self) -> Result<usize, StorageError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_terminal());
        Ok(before - self.sessions.len())
    }
}
