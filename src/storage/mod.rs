//! Storage abstractions for authenticators and sessions.
//!
//! Stores own their entities: authenticators are keyed by
//! `(identifier, type)`, sessions by session id. All mutations go through a
//! service; compound read-modify-write operations are committed inside a
//! single per-key critical section, which is why the lockout and password
//! bookkeeping live here rather than in the manager.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::authenticator::{Authenticator, AuthenticatorType};
use crate::models::policy::LockoutPolicy;
use crate::models::session::Session;

pub use memory::{InMemoryAuthenticatorStore, InMemorySessionStore};

#[derive(Debug, Clone)]
/// Snapshot of the failed-login bookkeeping after recording a failure.
pub struct LoginFailureState {
    /// Failed attempts currently inside the lockout window.
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub lockout_count: u32,
    /// Whether this particular failure triggered the lockout.
    pub became_locked: bool,
}

impl LoginFailureState {
    pub(crate) fn empty() -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
            lockout_count: 0,
            became_locked: false,
        }
    }
}

/// Storage contract for authenticators, their password history, and the
/// failed-attempt bookkeeping.
pub trait AuthenticatorStore: Send + Sync {
    /// Inserts a new authenticator; fails with `Duplicate` when one of the
    /// same type already exists for the identifier.
    fn insert(&self, authenticator: Authenticator) -> Result<(), StorageError>;

    fn find(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> Result<Option<Authenticator>, StorageError>;

    /// Replaces an existing authenticator of the same identifier and type.
    fn save(&self, authenticator: Authenticator) -> Result<(), StorageError>;

    /// Removes the authenticator; returns whether one existed.
    fn remove(&self, identifier: &str, kind: AuthenticatorType) -> Result<bool, StorageError>;

    fn list(&self, identifier: &str) -> Result<Vec<Authenticator>, StorageError>;

    /// Appends a hash to the identifier's password history, trimming to the
    /// `limit` most recent entries.
    fn push_history(&self, identifier: &str, hash: &str, limit: usize)
        -> Result<(), StorageError>;

    /// Returns up to `limit` retained hashes, most recent last.
    fn password_history(&self, identifier: &str, limit: usize)
        -> Result<Vec<String>, StorageError>;

    /// Commits a password rotation in one critical section: stores the new
    /// hash, appends it to the history, trims to `history_limit`, resets the
    /// attempt and lockout state, and recomputes expiry.
    fn update_password(
        &self,
        identifier: &str,
        new_hash: &str,
        expires_at: Option<DateTime<Utc>>,
        history_limit: usize,
    ) -> Result<Authenticator, StorageError>;

    /// Records a failed login at `now`. When the count of failures inside
    /// the policy window reaches the threshold the authenticator transitions
    /// to LOCKED with `locked_until = now + duration`.
    fn record_login_failure(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
        policy: LockoutPolicy,
    ) -> Result<LoginFailureState, StorageError>;

    /// Resets the failed-attempt window and any lockout; called on
    /// successful validation.
    fn clear_login_failures(&self, identifier: &str) -> Result<(), StorageError>;

    /// Repairs an elapsed lockout on read: when `now` has passed
    /// `locked_until` the status returns to ACTIVE, and the lockout
    /// timestamp and attempt window are cleared. Returns the effective
    /// authenticator.
    fn clear_elapsed_lockout(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Authenticator>, StorageError>;
}

/// Storage contract for sessions.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: Session) -> Result<(), StorageError>;

    /// Inserts the session only while the user's live count is below
    /// `limit`. Check and reserve happen in one critical section so
    /// concurrent creations cannot oversubscribe the limit; fails with
    /// `LimitExceeded` otherwise.
    fn insert_bounded(&self, session: Session, limit: usize) -> Result<(), StorageError>;

    fn find(&self, session_id: &str) -> Result<Option<Session>, StorageError>;

    /// Replaces an existing session record.
    fn save(&self, session: Session) -> Result<(), StorageError>;

    /// Mutates the session in place under per-key exclusion and returns the
    /// updated copy, or `None` when the session does not exist.
    fn modify(
        &self,
        session_id: &str,
        mutate: &mut dyn FnMut(&mut Session),
    ) -> Result<Option<Session>, StorageError>;

    /// Removes the session; returns whether one existed.
    fn delete(&self, session_id: &str) -> Result<bool, StorageError>;

    /// Atomically (from the caller's view) persists `session` under its new
    /// id and removes the entry stored under `old_id`.
    fn replace(&self, old_id: &str, session: Session) -> Result<(), StorageError>;

    fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, StorageError>;

    /// Counts sessions in ACTIVE or REQUIRES_REAUTH for the user.
    fn count_live_for_user(&self, user_id: &str) -> Result<usize, StorageError>;

    /// Removes every EXPIRED and TERMINATED record, returning how many were
    /// dropped.
    fn purge_terminated(&self) -> Result<usize, StorageError>;
}
