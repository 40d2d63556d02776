//! Types exchanged with a messaging client.
//!
//! The client itself is a port defined in `sessiongate-core`; these are the
//! values crossing that boundary: lifecycle events, connection state
//! snapshots, outbound payloads, and send receipts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::MediaPayload;

/// Events emitted by a messaging client after `initialize`.
///
/// These are the sole source of truth for a session's connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// An authentication challenge to be rendered as a scannable code.
    QrChallenge { raw: String },
    /// Authentication succeeded; the client can send.
    Ready,
    /// The connection dropped.
    Disconnected { reason: String },
    /// An inbound message from a contact.
    MessageReceived {
        from: String,
        body: Option<String>,
        has_media: bool,
    },
    /// The network acknowledged an outbound message.
    MessageAcknowledged { to: String, result_id: String },
}

impl ClientEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::QrChallenge { .. } => "qr_challenge",
            ClientEvent::Ready => "ready",
            ClientEvent::Disconnected { .. } => "disconnected",
            ClientEvent::MessageReceived { .. } => "message_received",
            ClientEvent::MessageAcknowledged { .. } => "message_acknowledged",
        }
    }
}

/// Connection state as reported by the client on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Connected,
    Disconnected,
    /// Any transient state (opening, pairing, conflict, ...), verbatim.
    Other(String),
}

impl TransportState {
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportState::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Connected => write!(f, "CONNECTED"),
            TransportState::Disconnected => write!(f, "DISCONNECTED"),
            TransportState::Other(s) => write!(f, "{s}"),
        }
    }
}

/// What the client is asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    Text(String),
    Media {
        media: MediaPayload,
        caption: Option<String>,
    },
}

impl OutboundPayload {
    pub fn is_media(&self) -> bool {
        matches!(self, OutboundPayload::Media { .. })
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Network-assigned message identifier.
    pub result_id: String,
}
