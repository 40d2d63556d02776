//! Global configuration types for sessiongate.
//!
//! `GatewayConfig` represents the top-level `config.toml` that controls send
//! deadlines, retention limits, teardown bounds, and upload handling.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway.
///
/// Loaded from `~/.sessiongate/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Deadline for a text send before it is recorded as failed.
    #[serde(default = "default_text_send_timeout_secs")]
    pub text_send_timeout_secs: u64,

    /// Deadline for a media send before it is recorded as failed.
    #[serde(default = "default_media_send_timeout_secs")]
    pub media_send_timeout_secs: u64,

    /// How long a pending entry stays queryable, regardless of outcome.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,

    /// Per-user history cap; the oldest entries are evicted first.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of history entries returned when the caller gives no limit.
    #[serde(default = "default_history_limit")]
    pub history_default_limit: usize,

    /// Upper bound on client logout + destroy during session teardown.
    #[serde(default = "default_teardown_timeout_secs")]
    pub teardown_timeout_secs: u64,

    /// Suffix appended to normalized phone numbers.
    #[serde(default = "default_address_suffix")]
    pub address_suffix: String,

    /// Whether sends from one user run concurrently or one at a time.
    #[serde(default)]
    pub send_policy: SendPolicy,

    /// Delay before a staged upload is deleted after a successful send.
    #[serde(default = "default_upload_cleanup_delay_secs")]
    pub upload_cleanup_delay_secs: u64,

    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Loopback client only: seconds between issuing a challenge and pairing.
    /// Zero keeps loopback sessions waiting for a scan forever.
    #[serde(default = "default_loopback_auto_pair_secs")]
    pub loopback_auto_pair_secs: u64,
}

fn default_text_send_timeout_secs() -> u64 {
    30
}

fn default_media_send_timeout_secs() -> u64 {
    60
}

fn default_pending_ttl_secs() -> u64 {
    5 * 60
}

fn default_history_capacity() -> usize {
    100
}

fn default_history_limit() -> usize {
    50
}

fn default_teardown_timeout_secs() -> u64 {
    10
}

fn default_address_suffix() -> String {
    "@c.us".to_string()
}

fn default_upload_cleanup_delay_secs() -> u64 {
    5
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_loopback_auto_pair_secs() -> u64 {
    3
}

impl GatewayConfig {
    pub fn text_send_timeout(&self) -> Duration {
        Duration::from_secs(self.text_send_timeout_secs)
    }

    pub fn media_send_timeout(&self) -> Duration {
        Duration::from_secs(self.media_send_timeout_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }

    pub fn upload_cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.upload_cleanup_delay_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            text_send_timeout_secs: default_text_send_timeout_secs(),
            media_send_timeout_secs: default_media_send_timeout_secs(),
            pending_ttl_secs: default_pending_ttl_secs(),
            history_capacity: default_history_capacity(),
            history_default_limit: default_history_limit(),
            teardown_timeout_secs: default_teardown_timeout_secs(),
            address_suffix: default_address_suffix(),
            send_policy: SendPolicy::default(),
            upload_cleanup_delay_secs: default_upload_cleanup_delay_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            loopback_auto_pair_secs: default_loopback_auto_pair_secs(),
        }
    }
}

/// Ordering policy for concurrent sends from the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SendPolicy {
    /// Sends race each other on the transport (no ordering guarantee).
    #[default]
    Parallel,
    /// One transport call per user at a time, in acceptance order.
    Serialize,
}

impl fmt::Display for SendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendPolicy::Parallel => write!(f, "parallel"),
            SendPolicy::Serialize => write!(f, "serialize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.text_send_timeout(), Duration::from_secs(30));
        assert_eq!(config.media_send_timeout(), Duration::from_secs(60));
        assert_eq!(config.pending_ttl(), Duration::from_secs(300));
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.history_default_limit, 50);
        assert_eq!(config.address_suffix, "@c.us");
        assert_eq!(config.send_policy, SendPolicy::Parallel);
        assert_eq!(config.max_upload_bytes, 52_428_800);
    }

    #[test]
    fn test_gateway_config_deserialize_with_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_gateway_config_deserialize_with_values() {
        let toml_str = r#"
text_send_timeout_secs = 10
pending_ttl_secs = 60
history_capacity = 20
address_suffix = "@s.whatsapp.net"
send_policy = "serialize"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.text_send_timeout_secs, 10);
        assert_eq!(config.pending_ttl_secs, 60);
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.address_suffix, "@s.whatsapp.net");
        assert_eq!(config.send_policy, SendPolicy::Serialize);
        // Untouched keys keep their defaults
        assert_eq!(config.media_send_timeout_secs, 60);
    }

    #[test]
    fn test_send_policy_rejects_unknown_value() {
        let result: Result<GatewayConfig, _> = toml::from_str("send_policy = \"random\"");
        assert!(result.is_err());
    }
}
