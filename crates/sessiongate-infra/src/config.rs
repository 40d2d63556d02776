//! Gateway configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.sessiongate/` in
//! production) and deserializes it into [`GatewayConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use sessiongate_types::config::GatewayConfig;

/// Load gateway configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GatewayConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config; omitted keys keep their defaults.
pub async fn load_gateway_config(data_dir: &Path) -> GatewayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
    };

    match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GatewayConfig::default()
        }
    }
}

/// Render a config as the TOML document `load_gateway_config` would accept.
pub fn render_gateway_config(config: &GatewayConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}
