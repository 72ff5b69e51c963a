//! In-process security event log.
//!
//! Events are mirrored to `tracing` and retained in a capped ring buffer so
//! embedding hosts can inspect recent security-relevant activity without an
//! external sink.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::session::ReauthReason;

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
/// Security-relevant occurrences recorded by the managers.
pub enum SecurityEvent {
    SessionCreated {
        session_id: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionTerminated {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionExpired {
        session_id: String,
        cause: String,
        timestamp: DateTime<Utc>,
    },
    ConcurrentLimitExceeded {
        user_id: String,
        limit: usize,
        timestamp: DateTime<Utc>,
    },
    HijackingAttempt {
        session_id: String,
        presented_ip: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SuspiciousActivity {
        session_id: String,
        ip: String,
        timestamp: DateTime<Utc>,
    },
    ReauthenticationRequired {
        session_id: String,
        reason: ReauthReason,
        timestamp: DateTime<Utc>,
    },
    AccountLocked {
        identifier: String,
        locked_until: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
}

/// Capped, thread-safe event log. Recording is a no-op when audit logging
/// is disabled.
#[derive(Debug)]
pub struct SecurityEventLog {
    enabled: bool,
    capacity: usize,
    events: RwLock<VecDeque<SecurityEvent>>,
}

impl SecurityEventLog {
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, event: SecurityEvent) {
        if !self.enabled {
            return;
        }
        tracing::info!(target: "gatekeeper::audit", event = ?event, "security event");
        let mut events = match self.events.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Most recent events, oldest first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let events = match self.events.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        match self.events.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
