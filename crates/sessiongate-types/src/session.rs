//! Session domain types.
//!
//! A `Session` is the per-user connection record. Its connection status is a
//! single authoritative [`SessionState`] enum; the authentication challenge
//! lives inside the `AwaitingScan` variant so that "connected" and "challenge
//! present" can never both be true.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// Maximum length of a user identifier, in characters (after trimming).
pub const MAX_USER_ID_LEN: usize = 50;

/// Caller-supplied identity owning exactly one session.
///
/// Always trimmed and between 1 and 50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate and normalize a raw user identifier.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidUserId(
                "user id cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_USER_ID_LEN {
            return Err(SessionError::InvalidUserId(format!(
                "user id must be at most {MAX_USER_ID_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Connection lifecycle of a session.
///
/// - Initializing: client allocated, no event received yet
/// - AwaitingScan: the client issued a challenge that must be scanned
/// - Connected: authenticated and able to send
/// - Disconnected: the client dropped (or failed to initialize)
/// - Destroyed: torn down explicitly, terminal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Initializing,
    AwaitingScan { challenge: String },
    Connected,
    Disconnected { reason: String },
    Destroyed,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Destroyed)
    }

    /// The pending authentication challenge, present only while awaiting a scan.
    pub fn qr_challenge(&self) -> Option<&str> {
        match self {
            SessionState::AwaitingScan { challenge } => Some(challenge),
            _ => None,
        }
    }

    /// Stable lowercase label used in listings and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::AwaitingScan { .. } => "awaiting_scan",
            SessionState::Connected => "connected",
            SessionState::Disconnected { .. } => "disconnected",
            SessionState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The per-user connection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// A freshly created session in the `Initializing` state.
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            state: SessionState::Initializing,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn qr_challenge(&self) -> Option<&str> {
        self.state.qr_challenge()
    }

    /// Refresh `last_activity_at`.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            user_id: self.user_id.clone(),
            state: self.state.label().to_string(),
            connected: self.is_connected(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// Read-only view of a session for listings and status checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub user_id: UserId,
    pub state: String,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Answer to "show me the QR code or tell me I'm connected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QrStatus {
    /// Already authenticated; no challenge to show.
    Connected,
    /// A challenge is waiting to be scanned.
    Challenge { qr: String },
    /// No challenge has been issued yet.
    NotReady,
}

impl QrStatus {
    pub fn from_state(state: &SessionState) -> Self {
        match state {
            SessionState::Connected => QrStatus::Connected,
            SessionState::AwaitingScan { challenge } => QrStatus::Challenge {
                qr: challenge.clone(),
            },
            _ => QrStatus::NotReady,
        }
    }
}
