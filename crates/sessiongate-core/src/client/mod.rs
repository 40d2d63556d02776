//! The messaging client port.
//!
//! - `messaging` -- `MessagingClient` trait and the `ClientFactory` that
//!   allocates one client plus its event stream per user
//! - `box_client` -- `BoxMessagingClient`, the object-safe wrapper used to
//!   store heterogeneous clients in the registry

pub mod box_client;
pub mod messaging;

pub use box_client::BoxMessagingClient;
pub use messaging::{ClientFactory, ClientHandle, MessagingClient};
