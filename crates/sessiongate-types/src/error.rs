use std::time::Duration;

use thiserror::Error;

/// Errors related to session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("session already exists for user '{0}'")]
    AlreadyExists(String),

    #[error("session not found for user '{0}'")]
    NotFound(String),

    #[error("messaging client could not be created: {0}")]
    ClientUnavailable(String),
}

/// Errors rejected synchronously when a send is requested.
///
/// Transport failures and timeouts never appear here: once a send is
/// accepted its outcome is only visible through pending and history queries.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("session not found for user '{0}'")]
    SessionNotFound(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("empty content: {0}")]
    EmptyContent(String),

    #[error("session is not connected (state: {state})")]
    NotConnected { state: String },
}

/// Errors reported by a messaging client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("message sending timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("client not ready, current state: {0}")]
    NotReady(String),

    #[error("client closed")]
    Closed,
}

/// Errors from tearing down a client. Logged, never block local cleanup.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("logout failed: {0}")]
    Logout(ClientError),

    #[error("destroy failed: {0}")]
    Destroy(ClientError),

    #[error("teardown timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors from staging an uploaded attachment.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file type not supported: {mime_type} ({file_name})")]
    UnsupportedType { mime_type: String, file_name: String },

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("upload storage error: {0}")]
    Io(String),
}
