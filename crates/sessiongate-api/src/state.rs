//! Application state wiring the gateway together.
//!
//! AppState holds the gateway service, the upload staging store, and the
//! loaded configuration shared by every HTTP handler.

use std::path::PathBuf;
use std::sync::Arc;

use sessiongate_core::client::ClientFactory;
use sessiongate_core::service::GatewayService;
use sessiongate_infra::config::load_gateway_config;
use sessiongate_infra::filesystem::{UploadStore, resolve_data_dir};
use sessiongate_infra::loopback::LoopbackFactory;
use sessiongate_types::config::GatewayConfig;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub uploads: UploadStore,
    pub config: Arc<GatewayConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, and wire the gateway
    /// to the loopback transport.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_gateway_config(&data_dir).await;
        let factory = Arc::new(LoopbackFactory::from_config(&config));

        tracing::info!(
            data_dir = %data_dir.display(),
            send_policy = %config.send_policy,
            "gateway state initialized"
        );
        Ok(Self::new(data_dir, config, factory))
    }

    pub fn new(data_dir: PathBuf, config: GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let gateway = Arc::new(GatewayService::new(&config, factory));
        let uploads = UploadStore::from_config(&data_dir, &config);
        Self {
            gateway,
            uploads,
            config: Arc::new(config),
            data_dir,
        }
    }
}
