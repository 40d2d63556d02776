//! Infrastructure layer for sessiongate.
//!
//! Contains the pieces that touch the outside world: the `config.toml`
//! loader, the data directory and upload staging area on disk, and the
//! loopback implementation of the `MessagingClient` port from
//! `sessiongate-core`.

pub mod config;
pub mod filesystem;
pub mod loopback;
