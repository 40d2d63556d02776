//! Gateway service wiring the registry, dispatcher, and stores together.
//!
//! GatewayService is the single entry point the HTTP layer talks to. It owns
//! the shared pending tracker and history store and hands them to both the
//! session registry (which removes them on teardown) and the dispatcher
//! (which writes send outcomes into them).

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sessiongate_types::config::GatewayConfig;
use sessiongate_types::error::{DispatchError, SessionError};
use sessiongate_types::message::{HistoryEntry, MediaPayload, PendingMessage};
use sessiongate_types::session::{QrStatus, Session, SessionSummary, UserId};
use tracing::info;

use crate::client::ClientFactory;
use crate::dispatch::{
    Dispatch, DispatchSettings, HistoryStore, MessageDispatcher, OutgoingMessage,
    PendingMessageTracker,
};
use crate::session::SessionRegistry;

/// A page of a user's history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub user_id: UserId,
    pub entries: Vec<HistoryEntry>,
    /// Entries retained for the user, before the limit was applied.
    pub total: usize,
}

/// Process-level liveness snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub active_sessions: usize,
    pub pending_messages: usize,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}

pub struct GatewayService {
    registry: Arc<SessionRegistry>,
    dispatcher: MessageDispatcher,
    pending: Arc<PendingMessageTracker>,
    history: Arc<HistoryStore>,
    started_at: Instant,
}

impl GatewayService {
    pub fn new(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let pending = Arc::new(PendingMessageTracker::new(config.pending_ttl()));
        let history = Arc::new(HistoryStore::new(
            config.history_capacity,
            config.history_default_limit,
        ));
        let registry = Arc::new(SessionRegistry::new(
            factory,
            Arc::clone(&pending),
            Arc::clone(&history),
            config.teardown_timeout(),
        ));
        let dispatcher = MessageDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&pending),
            Arc::clone(&history),
            DispatchSettings::from(config),
        );

        Self {
            registry,
            dispatcher,
            pending,
            history,
            started_at: Instant::now(),
        }
    }

    // --- Session lifecycle ---

    pub fn create_session(&self, user_id: &str) -> Result<Session, SessionError> {
        self.registry.create(user_id)
    }

    /// Session record, re-synced with the client's connection state.
    pub async fn session_status(&self, user_id: &str) -> Result<Session, SessionError> {
        self.registry.refresh_status(user_id).await
    }

    /// The pending QR challenge, or a note that the session is connected or
    /// has no challenge yet.
    pub async fn qr_status(&self, user_id: &str) -> Result<QrStatus, SessionError> {
        let session = self.registry.refresh_status(user_id).await?;
        Ok(QrStatus::from_state(&session.state))
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.registry.list()
    }

    pub async fn destroy_session(&self, user_id: &str) -> Result<(), SessionError> {
        self.registry.destroy(user_id).await
    }

    // --- Messaging ---

    pub fn send_text(&self, user_id: &str, to: &str, body: &str) -> Result<Dispatch, DispatchError> {
        self.dispatcher.send(
            user_id,
            to,
            OutgoingMessage::Text {
                body: body.to_string(),
            },
        )
    }

    /// Send an attachment with an optional caption. With no attachment the
    /// caption is sent as plain text.
    pub fn send_media(
        &self,
        user_id: &str,
        to: &str,
        media: Option<MediaPayload>,
        caption: Option<String>,
    ) -> Result<Dispatch, DispatchError> {
        self.dispatcher
            .send(user_id, to, OutgoingMessage::Media { media, caption })
    }

    // --- Queries ---

    pub fn list_history(&self, user_id: &str, limit: Option<usize>) -> Result<HistoryPage, SessionError> {
        let handle = self.registry.get(user_id)?;
        let user_id = handle.user_id().clone();
        Ok(HistoryPage {
            entries: self.history.query(&user_id, limit),
            total: self.history.len(&user_id),
            user_id,
        })
    }

    pub fn list_pending(&self, user_id: &str) -> Result<Vec<PendingMessage>, SessionError> {
        let handle = self.registry.get(user_id)?;
        Ok(self.pending.list_for(handle.user_id()))
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            active_sessions: self.registry.len(),
            pending_messages: self.pending.len(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }

    // --- Process lifecycle ---

    /// Tear down every live session. Returns how many clients failed to
    /// shut down cleanly.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.registry.len();
        let failures = self.registry.shutdown().await;
        info!(sessions, failures, "gateway shut down");
        failures
    }
}

impl std::fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFactory, wait_until};
    use sessiongate_types::client::ClientEvent;
    use sessiongate_types::message::PendingStatus;

    fn service() -> (GatewayService, Arc<ScriptedFactory>) {
        let factory = Arc::new(ScriptedFactory::default());
        let service = GatewayService::new(&GatewayConfig::default(), factory.clone());
        (service, factory)
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let (service, factory) = service();
        service.create_session("alice").unwrap();
        assert_eq!(service.qr_status("alice").await.unwrap(), QrStatus::NotReady);

        let control = factory.control("alice");
        control
            .emit(ClientEvent::QrChallenge {
                raw: "C1".to_string(),
            })
            .await;
        wait_until(|| service.list_sessions()[0].state == "awaiting_scan").await;
        assert_eq!(
            service.qr_status("alice").await.unwrap(),
            QrStatus::Challenge {
                qr: "C1".to_string()
            }
        );

        control.connect().await;
        wait_until(|| service.list_sessions()[0].connected).await;
        assert_eq!(service.qr_status("alice").await.unwrap(), QrStatus::Connected);

        let dispatch = service.send_text("alice", "15551234567", "hi").unwrap();
        dispatch.completion.await.unwrap();

        let page = service.list_history("alice", None).unwrap();
        assert_eq!(page.total, 1);
        let pending = service.list_pending("alice").unwrap();
        assert_eq!(pending[0].status, PendingStatus::Sent);

        let health = service.health();
        assert_eq!(health.active_sessions, 1);
        assert_eq!(health.pending_messages, 1);

        service.destroy_session("alice").await.unwrap();
        assert!(service.list_sessions().is_empty());
        assert!(matches!(
            service.list_history("alice", None),
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(service.health().pending_messages, 0);
    }

    #[tokio::test]
    async fn history_limit_applies() {
        let (service, factory) = service();
        service.create_session("alice").unwrap();
        let control = factory.control("alice");
        for n in 0..5 {
            control
                .emit(ClientEvent::MessageReceived {
                    from: "1@c.us".to_string(),
                    body: Some(format!("m{n}")),
                    has_media: false,
                })
                .await;
        }
        wait_until(|| service.list_history("alice", None).unwrap().total == 5).await;

        let page = service.list_history("alice", Some(2)).unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].body.as_deref(), Some("m4"));
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn shutdown_clears_all_sessions() {
        let (service, _factory) = service();
        service.create_session("alice").unwrap();
        service.create_session("bob").unwrap();

        assert_eq!(service.shutdown().await, 0);
        assert_eq!(service.health().active_sessions, 0);
    }
}
