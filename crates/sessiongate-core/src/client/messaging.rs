//! MessagingClient trait definition.
//!
//! This is the capability that actually speaks the chat protocol. One client
//! exists per session; it is driven by the registry and the dispatcher and
//! reports lifecycle changes through an event channel handed out by the
//! [`ClientFactory`] alongside it.

use sessiongate_types::client::{ClientEvent, OutboundPayload, SendReceipt, TransportState};
use sessiongate_types::error::ClientError;
use sessiongate_types::message::Recipient;
use sessiongate_types::session::UserId;
use tokio::sync::mpsc;

use super::box_client::BoxMessagingClient;

/// Trait for network transport backends.
///
/// Uses native async fn in traits (RPITIT). Implementations live in
/// sessiongate-infra or in the embedding application.
pub trait MessagingClient: Send + Sync {
    /// Start the client. Lifecycle events follow asynchronously on the
    /// event channel; a failure here is reported, not retried.
    fn initialize(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Query the live connection state.
    fn connection_state(
        &self,
    ) -> impl std::future::Future<Output = Result<TransportState, ClientError>> + Send;

    /// Deliver a payload to a normalized address.
    fn send(
        &self,
        target: &Recipient,
        payload: &OutboundPayload,
    ) -> impl std::future::Future<Output = Result<SendReceipt, ClientError>> + Send;

    /// Unlink the authenticated account.
    fn logout(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Release all resources. Must be safe to call after a failed logout.
    fn destroy(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

/// A freshly allocated client and the receiving end of its event stream.
pub struct ClientHandle {
    pub client: BoxMessagingClient,
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Allocates a client bound to one user identity.
///
/// Called by the registry while creating a session; must not block.
pub trait ClientFactory: Send + Sync {
    fn create(&self, user_id: &UserId) -> Result<ClientHandle, ClientError>;
}
