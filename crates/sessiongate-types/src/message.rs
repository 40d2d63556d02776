//! Outbound message, pending-send, and history types.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::session::UserId;

/// Maximum number of digits in a recipient number.
pub const MAX_RECIPIENT_DIGITS: usize = 16;

/// A validated, normalized recipient address (`{digits}{suffix}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipient(String);

impl Recipient {
    /// Validate a raw phone number and normalize it into a network address.
    ///
    /// Whitespace is ignored. The number may carry one leading `+`, must start
    /// with a non-zero digit, and must have 1 to 16 digits.
    pub fn parse(raw: &str, suffix: &str) -> Result<Self, DispatchError> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);

        if digits.is_empty() {
            return Err(DispatchError::InvalidRecipient(
                "recipient number is required".to_string(),
            ));
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DispatchError::InvalidRecipient(format!(
                "'{raw}' is not a phone number"
            )));
        }
        if digits.starts_with('0') {
            return Err(DispatchError::InvalidRecipient(
                "number must include the country code".to_string(),
            ));
        }
        if digits.len() > MAX_RECIPIENT_DIGITS {
            return Err(DispatchError::InvalidRecipient(format!(
                "number has more than {MAX_RECIPIENT_DIGITS} digits"
            )));
        }

        Ok(Self(format!("{digits}{suffix}")))
    }

    /// The full network address, e.g. `15551234567@c.us`.
    pub fn address(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata describing an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub mime_type: String,
    pub file_name: String,
}

/// An attachment staged on disk and ready to hand to the messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub descriptor: MediaDescriptor,
    pub path: PathBuf,
}

/// What a pending send carries, without the attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentDescriptor {
    Text {
        body: String,
    },
    Media {
        #[serde(flatten)]
        media: MediaDescriptor,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl ContentDescriptor {
    pub fn has_media(&self) -> bool {
        matches!(self, ContentDescriptor::Media { .. })
    }
}

/// Lifecycle of a pending send. Moves from `Pending` to a terminal state once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Sent,
    Failed,
}

impl PendingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PendingStatus::Pending)
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingStatus::Pending => write!(f, "pending"),
            PendingStatus::Sent => write!(f, "sent"),
            PendingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An in-flight send attempt, tracked until its TTL expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMessage {
    /// UUIDv7 key, unique per send attempt.
    pub key: Uuid,
    pub user_id: UserId,
    pub to: Recipient,
    pub content: ContentDescriptor,
    pub status: PendingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether a history entry was sent by the user or received from a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Delivery outcome recorded on sent history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Failed,
}

/// An immutable log record of a sent or received message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub direction: Direction,
    /// Recipient address for sent entries, sender address for received ones.
    pub counterparty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Record for a message the user sent, successful or not.
    pub fn sent(to: &Recipient, content: &ContentDescriptor, outcome: Result<(), String>) -> Self {
        let (body, media) = match content {
            ContentDescriptor::Text { body } => (Some(body.clone()), None),
            ContentDescriptor::Media { media, caption } => (caption.clone(), Some(media.clone())),
        };
        let (status, error) = match outcome {
            Ok(()) => (DeliveryStatus::Sent, None),
            Err(e) => (DeliveryStatus::Failed, Some(e)),
        };
        Self {
            direction: Direction::Sent,
            counterparty: to.address().to_string(),
            body,
            has_media: media.is_some(),
            media,
            status: Some(status),
            error,
            timestamp: Utc::now(),
        }
    }

    /// Record for an inbound message.
    pub fn received(from: impl Into<String>, body: Option<String>, has_media: bool) -> Self {
        Self {
            direction: Direction::Received,
            counterparty: from.into(),
            body,
            has_media,
            media: None,
            status: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Immediate acknowledgement returned when a send is accepted.
///
/// `sending` is always true: delivery completes asynchronously and is
/// observable only through pending and history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAck {
    pub key: Uuid,
    pub from: UserId,
    pub to: Recipient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub has_media: bool,
    pub timestamp: DateTime<Utc>,
    pub sending: bool,
}
