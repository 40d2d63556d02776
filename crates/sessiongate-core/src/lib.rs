//! Session lifecycle and message-dispatch orchestration for sessiongate.
//!
//! This crate defines the `MessagingClient` port that transport adapters
//! implement, and the components built on it: the per-user session registry
//! and connection state machine, the pending-send tracker, the bounded
//! history store, and the dispatcher. It depends only on
//! `sessiongate-types` -- never on `sessiongate-infra`.

pub mod client;
pub mod dispatch;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
