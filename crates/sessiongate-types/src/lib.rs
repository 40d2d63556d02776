//! Shared domain types for sessiongate.
//!
//! This crate contains the domain types used across the gateway: sessions and
//! their connection state, pending messages, history entries, the events and
//! results exchanged with a messaging client, configuration, and the error
//! taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
