//! BoxMessagingClient -- object-safe dynamic dispatch wrapper for MessagingClient.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `MessagingClientDyn` trait with boxed futures
//! 2. Blanket-impl `MessagingClientDyn` for all `T: MessagingClient`
//! 3. `BoxMessagingClient` wraps `Box<dyn MessagingClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use sessiongate_types::client::{OutboundPayload, SendReceipt, TransportState};
use sessiongate_types::error::ClientError;
use sessiongate_types::message::Recipient;

use super::messaging::MessagingClient;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`MessagingClient`] with boxed futures.
pub trait MessagingClientDyn: Send + Sync {
    fn initialize_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>>;

    fn connection_state_boxed(&self) -> BoxFuture<'_, Result<TransportState, ClientError>>;

    fn send_boxed<'a>(
        &'a self,
        target: &'a Recipient,
        payload: &'a OutboundPayload,
    ) -> BoxFuture<'a, Result<SendReceipt, ClientError>>;

    fn logout_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>>;

    fn destroy_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>>;
}

impl<T: MessagingClient> MessagingClientDyn for T {
    fn initialize_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.initialize())
    }

    fn connection_state_boxed(&self) -> BoxFuture<'_, Result<TransportState, ClientError>> {
        Box::pin(self.connection_state())
    }

    fn send_boxed<'a>(
        &'a self,
        target: &'a Recipient,
        payload: &'a OutboundPayload,
    ) -> BoxFuture<'a, Result<SendReceipt, ClientError>> {
        Box::pin(self.send(target, payload))
    }

    fn logout_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.logout())
    }

    fn destroy_boxed(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(self.destroy())
    }
}

/// Type-erased messaging client.
///
/// Since `MessagingClient` uses RPITIT it cannot be a trait object directly;
/// this wrapper exposes the same methods over `dyn MessagingClientDyn`.
pub struct BoxMessagingClient {
    inner: Box<dyn MessagingClientDyn + Send + Sync>,
}

impl BoxMessagingClient {
    pub fn new<T: MessagingClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub async fn initialize(&self) -> Result<(), ClientError> {
        self.inner.initialize_boxed().await
    }

    pub async fn connection_state(&self) -> Result<TransportState, ClientError> {
        self.inner.connection_state_boxed().await
    }

    pub async fn send(
        &self,
        target: &Recipient,
        payload: &OutboundPayload,
    ) -> Result<SendReceipt, ClientError> {
        self.inner.send_boxed(target, payload).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.inner.logout_boxed().await
    }

    pub async fn destroy(&self) -> Result<(), ClientError> {
        self.inner.destroy_boxed().await
    }
}

impl std::fmt::Debug for BoxMessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxMessagingClient").finish_non_exhaustive()
    }
}
