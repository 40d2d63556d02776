//! On-disk layout for sessiongate.
//!
//! ```text
//! {data_dir}/
//!   config.toml
//!   uploads/        staged attachments, deleted after each send
//! ```

pub mod upload;

use std::path::{Path, PathBuf};

pub use upload::UploadStore;

/// Compute the upload staging directory: `{data_dir}/uploads/`.
pub fn uploads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("uploads")
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `SESSIONGATE_DATA_DIR` environment variable
/// 2. `~/.sessiongate`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SESSIONGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".sessiongate");
    }

    // Last resort: current directory
    PathBuf::from(".sessiongate")
}
