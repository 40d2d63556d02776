//! Per-session connection state machine.
//!
//! Consumes client events and status-check observations and keeps one
//! [`Session`] record consistent under concurrent delivery. Each machine owns
//! its own lock; there is no lock shared between sessions.
//!
//! ```text
//! Initializing --qr--> AwaitingScan --ready--> Connected
//!      |                    |                      |
//!      +----disconnected----+----------------------+--> Disconnected --qr--> AwaitingScan
//!
//! any --teardown--> Destroyed (terminal)
//! ```

use std::sync::{Mutex, MutexGuard};

use sessiongate_types::client::{ClientEvent, TransportState};
use sessiongate_types::error::ClientError;
use sessiongate_types::session::{Session, SessionState, UserId};
use tracing::{debug, info, warn};

/// Compute the state an event moves a session into.
///
/// Returns `None` when the event does not change the connection state
/// (message traffic) or when the session is already destroyed.
pub fn next_state(current: &SessionState, event: &ClientEvent) -> Option<SessionState> {
    if current.is_terminal() {
        return None;
    }
    match event {
        ClientEvent::QrChallenge { raw } => Some(SessionState::AwaitingScan {
            challenge: raw.clone(),
        }),
        ClientEvent::Ready => Some(SessionState::Connected),
        ClientEvent::Disconnected { reason } => Some(SessionState::Disconnected {
            reason: reason.clone(),
        }),
        ClientEvent::MessageReceived { .. } | ClientEvent::MessageAcknowledged { .. } => None,
    }
}

/// Guards one session record and applies transitions atomically.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    session: Mutex<Session>,
}

impl ConnectionStateMachine {
    pub fn new(user_id: UserId) -> Self {
        Self {
            session: Mutex::new(Session::new(user_id)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A poisoned lock still holds a consistent record: every mutation
        // below is a single assignment.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of the current record.
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    /// Apply a client event. Every event refreshes `last_activity_at`,
    /// including message traffic that leaves the state unchanged.
    ///
    /// Returns the new state when a transition happened.
    pub fn apply(&self, event: &ClientEvent) -> Option<SessionState> {
        let mut session = self.lock();
        if session.state.is_terminal() {
            debug!(user_id = %session.user_id, event = event.kind(), "ignoring event for destroyed session");
            return None;
        }

        session.touch();
        let next = next_state(&session.state, event)?;
        let previous = std::mem::replace(&mut session.state, next.clone());

        match &next {
            SessionState::AwaitingScan { .. } => {
                info!(user_id = %session.user_id, from = %previous, "authentication challenge issued");
            }
            SessionState::Connected => {
                info!(user_id = %session.user_id, from = %previous, "session connected");
            }
            SessionState::Disconnected { reason } => {
                warn!(user_id = %session.user_id, from = %previous, %reason, "session disconnected");
            }
            _ => {}
        }
        Some(next)
    }

    /// Fold a live connection-state query into the record.
    ///
    /// A connected report moves the session to `Connected` (clearing any
    /// challenge). A non-connected report or a failed query only demotes a
    /// session that believed itself connected; a session waiting for a scan
    /// keeps its challenge.
    pub fn reconcile(&self, observed: Result<TransportState, ClientError>) -> Session {
        let mut session = self.lock();
        if session.state.is_terminal() {
            return session.clone();
        }

        match observed {
            Ok(TransportState::Connected) => {
                if !session.is_connected() {
                    info!(user_id = %session.user_id, from = %session.state, "status check found session connected");
                    session.state = SessionState::Connected;
                }
            }
            Ok(other) => {
                if session.is_connected() {
                    warn!(user_id = %session.user_id, observed = %other, "status check found session not connected");
                    session.state = SessionState::Disconnected {
                        reason: format!("status check reported {other}"),
                    };
                }
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "status check failed");
                if session.is_connected() {
                    session.state = SessionState::Disconnected {
                        reason: e.to_string(),
                    };
                }
            }
        }
        session.touch();
        session.clone()
    }

    /// Record activity that does not change the state (e.g. a successful send).
    pub fn touch(&self) {
        self.lock().touch();
    }

    /// Move to the terminal `Destroyed` state. Returns false if already there.
    pub fn mark_destroyed(&self) -> bool {
        let mut session = self.lock();
        if session.state.is_terminal() {
            return false;
        }
        session.state = SessionState::Destroyed;
        session.touch();
        true
    }
}
