//! Loopback messaging transport.
//!
//! A self-contained `MessagingClient` that walks through the same lifecycle
//! as a real chat-network client (challenge, pairing, ready, send, logout)
//! without leaving the process. `sgate serve` uses it unless an embedding
//! application supplies its own `ClientFactory`.

pub mod client;

pub use client::{LoopbackClient, LoopbackFactory};
