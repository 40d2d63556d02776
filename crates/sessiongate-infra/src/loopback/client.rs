//! LoopbackClient and its factory.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sessiongate_core::client::{BoxMessagingClient, ClientFactory, ClientHandle, MessagingClient};
use sessiongate_types::client::{ClientEvent, OutboundPayload, SendReceipt, TransportState};
use sessiongate_types::config::GatewayConfig;
use sessiongate_types::error::ClientError;
use sessiongate_types::message::Recipient;
use sessiongate_types::session::UserId;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Capacity of each client's event channel.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Pairing,
    Linked,
    LoggedOut,
    Destroyed,
}

#[derive(Debug)]
struct Shared {
    user_id: UserId,
    link: Mutex<Link>,
    events: mpsc::Sender<ClientEvent>,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Best-effort event delivery; a full or closed channel drops the event.
    fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.events.try_send(event) {
            debug!(user_id = %self.user_id, error = %e, "loopback event dropped");
        }
    }
}

/// In-process client that pairs itself after a fixed delay.
#[derive(Debug)]
pub struct LoopbackClient {
    shared: Arc<Shared>,
    auto_pair: Duration,
}

impl LoopbackClient {
    /// A client for `user_id` and the receiving end of its event stream.
    ///
    /// A zero `auto_pair` leaves the client waiting for a scan forever.
    pub fn new(user_id: UserId, auto_pair: Duration) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Self {
            shared: Arc::new(Shared {
                user_id,
                link: Mutex::new(Link::Idle),
                events: tx,
            }),
            auto_pair,
        };
        (client, rx)
    }
}

impl MessagingClient for LoopbackClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        {
            let mut link = self.shared.link();
            if *link == Link::Destroyed {
                return Err(ClientError::Closed);
            }
            *link = Link::Pairing;
        }

        let challenge = format!(
            "sgate-loopback:{}:{}",
            self.shared.user_id,
            Uuid::now_v7().simple()
        );
        self.shared.emit(ClientEvent::QrChallenge { raw: challenge });

        if !self.auto_pair.is_zero() {
            let shared = Arc::clone(&self.shared);
            let delay = self.auto_pair;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let paired = {
                    let mut link = shared.link();
                    if *link == Link::Pairing {
                        *link = Link::Linked;
                        true
                    } else {
                        false
                    }
                };
                if paired {
                    info!(user_id = %shared.user_id, "loopback client paired");
                    shared.emit(ClientEvent::Ready);
                }
            });
        }
        Ok(())
    }

    async fn connection_state(&self) -> Result<TransportState, ClientError> {
        match *self.shared.link() {
            Link::Linked => Ok(TransportState::Connected),
            Link::Pairing => Ok(TransportState::Other("PAIRING".to_string())),
            Link::Idle | Link::LoggedOut => Ok(TransportState::Disconnected),
            Link::Destroyed => Err(ClientError::Closed),
        }
    }

    async fn send(
        &self,
        target: &Recipient,
        payload: &OutboundPayload,
    ) -> Result<SendReceipt, ClientError> {
        match *self.shared.link() {
            Link::Linked => {}
            Link::Destroyed => return Err(ClientError::Closed),
            other => return Err(ClientError::NotReady(format!("{other:?}").to_uppercase())),
        }

        if let OutboundPayload::Media { media, .. } = payload {
            tokio::fs::metadata(&media.path).await.map_err(|e| {
                ClientError::Transport(format!("cannot read {}: {e}", media.path.display()))
            })?;
        }

        let result_id = format!("true_{}_{}", target.address(), Uuid::now_v7().simple());
        debug!(
            user_id = %self.shared.user_id,
            to = %target,
            media = payload.is_media(),
            %result_id,
            "loopback delivered message"
        );
        self.shared.emit(ClientEvent::MessageAcknowledged {
            to: target.address().to_string(),
            result_id: result_id.clone(),
        });
        Ok(SendReceipt { result_id })
    }

    async fn logout(&self) -> Result<(), ClientError> {
        {
            let mut link = self.shared.link();
            if *link == Link::Destroyed {
                return Err(ClientError::Closed);
            }
            *link = Link::LoggedOut;
        }
        self.shared.emit(ClientEvent::Disconnected {
            reason: "logged out".to_string(),
        });
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        *self.shared.link() = Link::Destroyed;
        Ok(())
    }
}

/// Allocates one [`LoopbackClient`] per session.
#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    auto_pair: Duration,
}

impl LoopbackFactory {
    pub fn new(auto_pair: Duration) -> Self {
        Self { auto_pair }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(Duration::from_secs(config.loopback_auto_pair_secs))
    }
}

impl ClientFactory for LoopbackFactory {
    fn create(&self, user_id: &UserId) -> Result<ClientHandle, ClientError> {
        let (client, events) = LoopbackClient::new(user_id.clone(), self.auto_pair);
        Ok(ClientHandle {
            client: BoxMessagingClient::new(client),
            events,
        })
    }
}
