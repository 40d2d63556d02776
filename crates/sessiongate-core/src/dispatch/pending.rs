//! In-flight send tracking with a fixed time-to-live.
//!
//! Every send attempt gets a UUIDv7 key (unique even for two sends to the
//! same recipient in the same millisecond) and a record that moves from
//! `pending` to `sent` or `failed` exactly once. Records are evicted a fixed
//! delay after creation whether or not the send ever resolved, which bounds
//! memory even when a transport hangs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use sessiongate_types::message::{ContentDescriptor, PendingMessage, PendingStatus, Recipient};
use sessiongate_types::session::UserId;
use tracing::{debug, warn};
use uuid::Uuid;

/// A pending record plus the instant after which it is no longer visible.
#[derive(Debug)]
struct Tracked {
    message: PendingMessage,
    expires_at: Instant,
}

/// Shared tracker of pending sends across all users.
#[derive(Debug)]
pub struct PendingMessageTracker {
    entries: Arc<DashMap<Uuid, Tracked>>,
    ttl: Duration,
}

impl PendingMessageTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Record a new send in the `pending` state and schedule its eviction.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self, user_id: &UserId, to: &Recipient, content: ContentDescriptor) -> PendingMessage {
        let key = Uuid::now_v7();
        let message = PendingMessage {
            key,
            user_id: user_id.clone(),
            to: to.clone(),
            content,
            status: PendingStatus::Pending,
            created_at: Utc::now(),
            result_id: None,
            error: None,
        };

        self.entries.insert(
            key,
            Tracked {
                message: message.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if entries.remove(&key).is_some() {
                debug!(message_key = %key, "evicted pending message");
            }
        });

        message
    }

    /// Mark a send as delivered. Returns false if the record is gone or
    /// already terminal.
    pub fn complete(&self, key: &Uuid, result_id: impl Into<String>) -> bool {
        self.finish(key, PendingStatus::Sent, |m| m.result_id = Some(result_id.into()))
    }

    /// Mark a send as failed. Returns false if the record is gone or already
    /// terminal.
    pub fn fail(&self, key: &Uuid, error: impl Into<String>) -> bool {
        self.finish(key, PendingStatus::Failed, |m| m.error = Some(error.into()))
    }

    fn finish(
        &self,
        key: &Uuid,
        status: PendingStatus,
        annotate: impl FnOnce(&mut PendingMessage),
    ) -> bool {
        let Some(mut tracked) = self.entries.get_mut(key) else {
            debug!(message_key = %key, %status, "pending message already evicted");
            return false;
        };
        if tracked.expires_at <= Instant::now() {
            debug!(message_key = %key, %status, "pending message expired");
            return false;
        }
        if tracked.message.status.is_terminal() {
            warn!(
                message_key = %key,
                current = %tracked.message.status,
                attempted = %status,
                "pending message already resolved"
            );
            return false;
        }
        tracked.message.status = status;
        annotate(&mut tracked.message);
        true
    }

    /// Look up a single record, if still visible.
    pub fn get(&self, key: &Uuid) -> Option<PendingMessage> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|t| t.expires_at > now)
            .map(|t| t.message.clone())
    }

    /// Visible records for one user, oldest first.
    pub fn list_for(&self, user_id: &UserId) -> Vec<PendingMessage> {
        let now = Instant::now();
        let mut messages: Vec<PendingMessage> = self
            .entries
            .iter()
            .filter(|t| t.expires_at > now && &t.message.user_id == user_id)
            .map(|t| t.message.clone())
            .collect();
        messages.sort_by_key(|m| m.key);
        messages
    }

    /// Drop every record belonging to a user. Returns how many were removed.
    pub fn purge_user(&self, user_id: &UserId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, t| &t.message.user_id != user_id);
        before.saturating_sub(self.entries.len())
    }

    /// Number of visible records across all users.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|t| t.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
