//! Session lifecycle scenarios: concurrent limits, id regeneration,
//! re-authentication round trips, and timeout-driven expiry.

use chrono::{Duration, Utc};
use serde_json::Value;

use gatekeeper::{
    AuthError, Config, ReauthReason, SessionState, SessionStore,
};

mod support;

use support::{session_manager, session_manager_with, test_config};

#[test]
fn concurrent_limit_blocks_the_third_session() {
    let config = Config {
        max_concurrent_sessions: 2,
        ..test_config()
    };
    let (_, manager) = session_manager_with(config);

    let first = manager.create_session("carol", None, None).unwrap();
    manager.create_session("carol", None, None).unwrap();
    assert!(matches!(
        manager.create_session("carol", None, None),
        Err(AuthError::ConcurrentLimitExceeded(user)) if user == "carol"
    ));

    // Terminating one frees a slot for a new session.
    assert!(manager.terminate_session(&first.session_id).unwrap());
    manager.create_session("carol", None, None).unwrap();
}

#[test]
fn session_ids_are_high_entropy_url_safe_strings() {
    let (_, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();
    assert!(session.session_id.len() > 20);
    assert!(session
        .session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn regeneration_preserves_attributes_and_invalidates_the_old_id() {
    let (store, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();
    store
        .modify(&session.session_id, &mut |s| {
            s.set_attribute("key1", Value::String("value1".into()));
            s.set_security_attribute("role", Value::String("admin".into()));
        })
        .unwrap();

    let renewed = manager.regenerate_session_id(&session.session_id).unwrap();
    assert_ne!(renewed.session_id, session.session_id);

    assert!(manager.get_session(&session.session_id).unwrap().is_none());
    let fetched = manager.get_session(&renewed.session_id).unwrap().unwrap();
    assert_eq!(
        fetched.attribute("key1"),
        Some(&Value::String("value1".into()))
    );
    assert_eq!(
        fetched.security_attribute("role"),
        Some(&Value::String("admin".into()))
    );
    assert_eq!(fetched.state, SessionState::Active);
}

#[test]
fn reauth_trigger_and_mark_round_trip() {
    let (_, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();

    manager
        .trigger_reauthentication(&session.session_id, ReauthReason::RoleChange)
        .unwrap();
    let pending = manager.get_session(&session.session_id).unwrap().unwrap();
    assert_eq!(pending.state, SessionState::RequiresReauth);
    assert!(pending.requires_reauthentication());

    let refreshed = manager.mark_reauthenticated(&session.session_id).unwrap();
    assert_eq!(refreshed.state, SessionState::Active);
    assert!(refreshed.pending_reauth_reasons.is_empty());
    assert!(!refreshed.requires_reauthentication());
}

#[test]
fn expired_session_disappears_from_reads_but_stays_stored() {
    let (store, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();

    store
        .modify(&session.session_id, &mut |s| {
            let past = Utc::now() - Duration::hours(3);
            s.created_at = past;
            s.last_accessed = past;
            s.last_reauthentication = past;
        })
        .unwrap();

    assert!(manager.get_session(&session.session_id).unwrap().is_none());
    let stored = store.find(&session.session_id).unwrap().unwrap();
    assert_eq!(stored.state, SessionState::Expired);
    assert_eq!(manager.active_session_count("carol").unwrap(), 0);
}

#[test]
fn inactivity_expires_a_recent_session() {
    let config = Config {
        inactivity_timeout_seconds: 60,
        ..test_config()
    };
    let (store, manager) = session_manager_with(config);
    let session = manager.create_session("carol", None, None).unwrap();

    store
        .modify(&session.session_id, &mut |s| {
            s.last_accessed = Utc::now() - Duration::seconds(120);
        })
        .unwrap();

    assert!(manager.get_session(&session.session_id).unwrap().is_none());
    assert_eq!(
        store.find(&session.session_id).unwrap().unwrap().state,
        SessionState::Expired
    );
}

#[test]
fn stale_identity_proof_adds_the_timeout_reason() {
    let (store, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();
    store
        .modify(&session.session_id, &mut |s| {
            s.last_reauthentication = Utc::now() - Duration::seconds(3700);
        })
        .unwrap();

    let fetched = manager.get_session(&session.session_id).unwrap().unwrap();
    assert_eq!(fetched.state, SessionState::RequiresReauth);
    assert!(fetched
        .pending_reauth_reasons
        .contains(&ReauthReason::SessionTimeout));
}

#[test]
fn touch_renews_only_live_sessions() {
    let (_, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();

    let touched = manager.touch(&session.session_id).unwrap().unwrap();
    assert_eq!(touched.access_count, 1);

    manager.terminate_session(&session.session_id).unwrap();
    assert!(manager.touch(&session.session_id).unwrap().is_none());
}

#[test]
fn terminate_all_user_sessions_counts_what_it_closed() {
    let (_, manager) = session_manager();
    manager.create_session("carol", None, None).unwrap();
    manager.create_session("carol", None, None).unwrap();
    manager.create_session("dave", None, None).unwrap();

    assert_eq!(manager.terminate_all_user_sessions("carol").unwrap(), 2);
    assert_eq!(manager.active_session_count("carol").unwrap(), 0);
    assert_eq!(manager.active_session_count("dave").unwrap(), 1);
}

#[test]
fn terminated_sessions_never_come_back() {
    let (store, manager) = session_manager();
    let session = manager.create_session("carol", None, None).unwrap();
    manager.terminate_session(&session.session_id).unwrap();

    assert!(manager.get_session(&session.session_id).unwrap().is_none());
    assert!(matches!(
        manager.mark_reauthenticated(&session.session_id),
        Err(AuthError::InvalidState(_))
    ));

    // The record itself is retained until housekeeping removes it.
    assert!(store.find(&session.session_id).unwrap().is_some());
    assert_eq!(manager.lifecycle().purge_terminated().unwrap(), 1);
    assert!(store.find(&session.session_id).unwrap().is_none());
}

#[test]
fn oldest_live_session_is_evicted_at_the_limit() {
    let config = Config {
        max_concurrent_sessions: 2,
        ..test_config()
    };
    let (store, manager) = session_manager_with(config);
    let first = manager.create_session("carol", None, None).unwrap();
    manager.create_session("carol", None, None).unwrap();

    let evicted = manager
        .lifecycle()
        .terminate_oldest_if_limit_exceeded("carol")
        .unwrap();
    assert_eq!(evicted, Some(first.session_id.clone()));
    assert_eq!(
        store.find(&first.session_id).unwrap().unwrap().state,
        SessionState::Terminated
    );

    // A slot is free again.
    manager.create_session("carol", None, None).unwrap();
}
