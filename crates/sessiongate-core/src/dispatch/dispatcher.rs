//! Message dispatcher: accept a send synchronously, deliver it asynchronously.
//!
//! `send` validates the request and the session's readiness up front and
//! returns an acknowledgement immediately. Delivery then runs on its own
//! task: the transport call is raced against a deadline (text and media have
//! separate deadlines), and the outcome is written to the pending tracker and
//! the user's history. A transport call that loses the race keeps running
//! detached; its late result is discarded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sessiongate_types::client::{OutboundPayload, SendReceipt};
use sessiongate_types::config::{GatewayConfig, SendPolicy};
use sessiongate_types::error::{ClientError, DispatchError};
use sessiongate_types::message::{
    ContentDescriptor, DispatchAck, HistoryEntry, MediaPayload, Recipient,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::registry::{SessionHandle, SessionRegistry};

use super::history::HistoryStore;
use super::pending::PendingMessageTracker;

/// Dispatcher knobs, derived from [`GatewayConfig`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub text_timeout: Duration,
    pub media_timeout: Duration,
    pub address_suffix: String,
    pub policy: SendPolicy,
}

impl From<&GatewayConfig> for DispatchSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            text_timeout: config.text_send_timeout(),
            media_timeout: config.media_send_timeout(),
            address_suffix: config.address_suffix.clone(),
            policy: config.send_policy,
        }
    }
}

/// A send request as it arrives from the caller.
#[derive(Debug, Clone)]
pub enum OutgoingMessage {
    Text {
        body: String,
    },
    /// An attachment with optional caption. Without an attachment the caption
    /// alone is sent as text.
    Media {
        media: Option<MediaPayload>,
        caption: Option<String>,
    },
}

/// How an accepted send ended.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub key: Uuid,
    pub result: Result<SendReceipt, ClientError>,
}

/// An accepted send: the immediate acknowledgement plus the delivery task.
///
/// Dropping `completion` does not cancel delivery.
#[derive(Debug)]
pub struct Dispatch {
    pub ack: DispatchAck,
    pub completion: JoinHandle<DispatchOutcome>,
}

/// A validated request ready for the transport.
struct Prepared {
    payload: OutboundPayload,
    content: ContentDescriptor,
    deadline: Duration,
}

pub struct MessageDispatcher {
    registry: Arc<SessionRegistry>,
    pending: Arc<PendingMessageTracker>,
    history: Arc<HistoryStore>,
    settings: DispatchSettings,
}

impl MessageDispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        pending: Arc<PendingMessageTracker>,
        history: Arc<HistoryStore>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            pending,
            history,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Accept a send for `user_id` to the raw number `to`.
    ///
    /// Every check here is synchronous; on error nothing is recorded and no
    /// task is started. On success a pending record exists in the `pending`
    /// state and delivery proceeds in the background.
    pub fn send(
        &self,
        user_id: &str,
        to: &str,
        message: OutgoingMessage,
    ) -> Result<Dispatch, DispatchError> {
        let handle = self
            .registry
            .get(user_id)
            .map_err(|_| DispatchError::SessionNotFound(user_id.trim().to_string()))?;

        let recipient = Recipient::parse(to, &self.settings.address_suffix)?;
        let prepared = self.prepare(message)?;

        if handle.is_closing() || !handle.machine().is_connected() {
            return Err(DispatchError::NotConnected {
                state: handle.machine().state().label().to_string(),
            });
        }

        let pending = self
            .pending
            .begin(handle.user_id(), &recipient, prepared.content.clone());

        let ack = DispatchAck {
            key: pending.key,
            from: handle.user_id().clone(),
            to: recipient.clone(),
            content: match &prepared.content {
                ContentDescriptor::Text { body } => Some(body.clone()),
                ContentDescriptor::Media { caption, .. } => caption.clone(),
            },
            has_media: prepared.content.has_media(),
            timestamp: Utc::now(),
            sending: true,
        };

        info!(
            user_id = %handle.user_id(),
            to = %recipient,
            message_key = %pending.key,
            media = prepared.payload.is_media(),
            "send accepted"
        );

        let completion = tokio::spawn(deliver(
            handle,
            Arc::clone(&self.pending),
            Arc::clone(&self.history),
            self.settings.policy,
            pending.key,
            recipient,
            prepared,
        ));

        Ok(Dispatch { ack, completion })
    }

    fn prepare(&self, message: OutgoingMessage) -> Result<Prepared, DispatchError> {
        match message {
            OutgoingMessage::Text { body } => self.prepare_text(&body),
            OutgoingMessage::Media {
                media: Some(media),
                caption,
            } => {
                let caption = caption
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty());
                Ok(Prepared {
                    content: ContentDescriptor::Media {
                        media: media.descriptor.clone(),
                        caption: caption.clone(),
                    },
                    payload: OutboundPayload::Media { media, caption },
                    deadline: self.settings.media_timeout,
                })
            }
            OutgoingMessage::Media {
                media: None,
                caption,
            } => match caption {
                Some(c) if !c.trim().is_empty() => self.prepare_text(&c),
                _ => Err(DispatchError::EmptyContent(
                    "either message or file is required".to_string(),
                )),
            },
        }
    }

    fn prepare_text(&self, body: &str) -> Result<Prepared, DispatchError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(DispatchError::EmptyContent(
                "message content is required".to_string(),
            ));
        }
        Ok(Prepared {
            payload: OutboundPayload::Text(body.to_string()),
            content: ContentDescriptor::Text {
                body: body.to_string(),
            },
            deadline: self.settings.text_timeout,
        })
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Background half of a send: gate, readiness check, race, record.
async fn deliver(
    handle: Arc<SessionHandle>,
    pending: Arc<PendingMessageTracker>,
    history: Arc<HistoryStore>,
    policy: SendPolicy,
    key: Uuid,
    to: Recipient,
    prepared: Prepared,
) -> DispatchOutcome {
    let _gate = match policy {
        SendPolicy::Serialize => Some(handle.send_gate().lock().await),
        SendPolicy::Parallel => None,
    };

    let result = attempt(&handle, &to, prepared.payload, prepared.deadline).await;

    match &result {
        Ok(receipt) => {
            pending.complete(&key, receipt.result_id.clone());
            history.append(
                handle.user_id(),
                handle.generation(),
                HistoryEntry::sent(&to, &prepared.content, Ok(())),
            );
            handle.machine().touch();
            info!(
                user_id = %handle.user_id(),
                %to,
                message_key = %key,
                result_id = %receipt.result_id,
                "message sent"
            );
        }
        Err(e) => {
            pending.fail(&key, e.to_string());
            history.append(
                handle.user_id(),
                handle.generation(),
                HistoryEntry::sent(&to, &prepared.content, Err(e.to_string())),
            );
            warn!(
                user_id = %handle.user_id(),
                %to,
                message_key = %key,
                error = %e,
                "message send failed"
            );
        }
    }

    DispatchOutcome { key, result }
}

/// Verify readiness at the moment of sending, then race the transport
/// against `deadline`. The readiness query is bounded by the same deadline.
async fn attempt(
    handle: &Arc<SessionHandle>,
    to: &Recipient,
    payload: OutboundPayload,
    deadline: Duration,
) -> Result<SendReceipt, ClientError> {
    if !handle.machine().is_connected() {
        return Err(ClientError::NotReady(handle.machine().state().to_string()));
    }
    let transport = handle.transport_state(deadline).await?;
    if !transport.is_connected() {
        return Err(ClientError::NotReady(transport.to_string()));
    }

    let client = Arc::clone(handle.client());
    let target = to.clone();
    let send = tokio::spawn(async move { client.send(&target, &payload).await });

    match tokio::time::timeout(deadline, send).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ClientError::Transport(format!(
            "send task failed: {join_error}"
        ))),
        Err(_) => Err(ClientError::Timeout(deadline)),
    }
}
