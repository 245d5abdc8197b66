//! Session-scoped progress mailbox
//!
//! The pipeline publishes events keyed by session id; a transport drains
//! them on its own schedule. A queue is created on the first publish (or
//! when a consumer attaches first), so a late subscriber still receives
//! everything published so far. Once disposed, a session keeps a tombstone
//! and further publishes are dropped. Idle queues and tombstones are swept
//! after the configured TTL. A pipeline run claims its session before it
//! publishes anything, and a session can be claimed once.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lease_types::{ProgressEvent, ProgressStatus};
use tokio::sync::Notify;
use tracing::debug;

enum SessionSlot {
    Open {
        events: VecDeque<ProgressEvent>,
        notify: Arc<Notify>,
        touched: Instant,
        /// Set once a producer owns the session
        claimed: bool,
    },
    Disposed {
        at: Instant,
    },
}

impl SessionSlot {
    fn open(now: Instant) -> Self {
        SessionSlot::Open {
            events: VecDeque::new(),
            notify: Arc::new(Notify::new()),
            touched: now,
            claimed: false,
        }
    }

    fn last_activity(&self) -> Instant {
        match self {
            SessionSlot::Open { touched, .. } => *touched,
            SessionSlot::Disposed { at } => *at,
        }
    }
}

/// Registry of per-session progress queues
pub struct ProgressChannel {
    sessions: Mutex<HashMap<String, SessionSlot>>,
    ttl: Duration,
}

impl ProgressChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    // A panic while holding the lock cannot leave a queue half-written, so
    // recovering the guard keeps publish infallible.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take ownership of a session for one producer. Fails if the session
    /// was already claimed or has been disposed. A consumer that attached
    /// first does not count as a claim.
    pub fn claim(&self, session_id: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.lock();
        self.sweep(&mut sessions, now);

        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot::open(now));

        match slot {
            SessionSlot::Open {
                claimed, touched, ..
            } if !*claimed => {
                *claimed = true;
                *touched = now;
                true
            }
            _ => {
                debug!(session_id, "Session already claimed or disposed");
                false
            }
        }
    }

    /// Append an event built from its parts
    pub fn publish(
        &self,
        session_id: &str,
        step: &str,
        status: ProgressStatus,
        details: Option<serde_json::Value>,
    ) {
        let mut event = ProgressEvent::new(step, status);
        event.details = details;
        self.publish_event(session_id, event);
    }

    /// Append a prepared event. Dropped silently if the session was disposed.
    pub fn publish_event(&self, session_id: &str, event: ProgressEvent) {
        let now = Instant::now();
        let mut sessions = self.lock();
        self.sweep(&mut sessions, now);

        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot::open(now));

        match slot {
            SessionSlot::Open {
                events,
                notify,
                touched,
                ..
            } => {
                events.push_back(event);
                *touched = now;
                notify.notify_one();
            }
            SessionSlot::Disposed { .. } => {
                debug!(session_id, step = %event.step, "Dropping event for disposed session");
            }
        }
    }

    /// Remove and return everything queued for a session, oldest first
    pub fn drain(&self, session_id: &str) -> Vec<ProgressEvent> {
        let mut sessions = self.lock();
        match sessions.get_mut(session_id) {
            Some(SessionSlot::Open {
                events, touched, ..
            }) => {
                *touched = Instant::now();
                events.drain(..).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Drop all state for a session; later publishes are ignored
    pub fn dispose(&self, session_id: &str) {
        let mut sessions = self.lock();
        sessions.insert(
            session_id.to_string(),
            SessionSlot::Disposed { at: Instant::now() },
        );
        debug!(session_id, "Disposed progress session");
    }

    /// Wake-up handle for a consumer, creating the queue if needed.
    /// `None` once the session has been disposed.
    pub fn attach(&self, session_id: &str) -> Option<Arc<Notify>> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot::open(now));

        match slot {
            SessionSlot::Open { notify, touched, .. } => {
                *touched = now;
                Some(Arc::clone(notify))
            }
            SessionSlot::Disposed { .. } => None,
        }
    }

    pub fn is_disposed(&self, session_id: &str) -> bool {
        matches!(
            self.lock().get(session_id),
            Some(SessionSlot::Disposed { .. })
        )
    }

    /// Number of events waiting for a session
    pub fn pending(&self, session_id: &str) -> usize {
        match self.lock().get(session_id) {
            Some(SessionSlot::Open { events, .. }) => events.len(),
            _ => 0,
        }
    }

    /// Number of tracked sessions, tombstones included
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn sweep(&self, sessions: &mut HashMap<String, SessionSlot>, now: Instant) {
        let ttl = self.ttl;
        sessions.retain(|_, slot| now.duration_since(slot.last_activity()) < ttl);
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}
