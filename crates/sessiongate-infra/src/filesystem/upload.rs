//! Staging area for uploaded attachments.
//!
//! An upload is accepted when either its declared MIME type or its file
//! extension is on the allow-list (images, PDF, office documents, plain text,
//! audio, video) and it fits the size limit. Accepted bytes are written under
//! a unique name in the staging directory and handed to the dispatcher as a
//! [`MediaPayload`]. Staged files are always deleted afterwards: shortly after
//! a successful send, immediately after a failed or rejected one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sessiongate_types::config::GatewayConfig;
use sessiongate_types::error::UploadError;
use sessiongate_types::message::{MediaDescriptor, MediaPayload};
use tracing::{debug, warn};
use uuid::Uuid;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/csv",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "audio/m4a",
    "audio/aac",
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/wmv",
    "video/flv",
    "video/webm",
];

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "pdf", "doc", "docx", "txt", "csv", "mp3", "wav",
    "ogg", "m4a", "aac", "mp4", "avi", "mov", "wmv", "flv", "webm",
];

/// Lowercased extension of a file name, without the dot.
fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Guess a MIME type from the file extension when the client sent none.
fn detect_mime(file_name: &str) -> &'static str {
    match extension(file_name).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/m4a",
        "aac" => "audio/aac",
        "mp4" => "video/mp4",
        "avi" => "video/avi",
        "mov" => "video/mov",
        "wmv" => "video/wmv",
        "flv" => "video/flv",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Strip any directory components a client put in the file name.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

/// Upload staging directory with its acceptance rules.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
    cleanup_delay: Duration,
}

impl UploadStore {
    pub fn new(dir: PathBuf, max_bytes: u64, cleanup_delay: Duration) -> Self {
        Self {
            dir,
            max_bytes,
            cleanup_delay,
        }
    }

    /// Store rooted at `{data_dir}/uploads/` with limits from `config`.
    pub fn from_config(data_dir: &Path, config: &GatewayConfig) -> Self {
        Self::new(
            super::uploads_dir(data_dir),
            config.max_upload_bytes,
            config.upload_cleanup_delay(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Accept if either the MIME type or the extension is allowed.
    pub fn is_allowed(file_name: &str, mime_type: &str) -> bool {
        let mime = mime_type.trim().to_lowercase();
        ALLOWED_MIME_TYPES.contains(&mime.as_str())
            || ALLOWED_EXTENSIONS.contains(&extension(file_name).as_str())
    }

    /// Validate and write an upload to the staging directory.
    pub async fn stage(
        &self,
        file_name: &str,
        mime_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<MediaPayload, UploadError> {
        let file_name = sanitize_file_name(file_name);
        let mime_type = match mime_type.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => detect_mime(&file_name).to_string(),
        };

        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        if !Self::is_allowed(&file_name, &mime_type) {
            warn!(%file_name, %mime_type, "upload rejected: type not allowed");
            return Err(UploadError::UnsupportedType {
                mime_type,
                file_name,
            });
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UploadError::Io(format!("create {}: {e}", self.dir.display())))?;
        let path = self
            .dir
            .join(format!("{}-{}", Uuid::now_v7().simple(), file_name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| UploadError::Io(format!("write {}: {e}", path.display())))?;

        debug!(path = %path.display(), size, %mime_type, "upload staged");
        Ok(MediaPayload {
            descriptor: MediaDescriptor {
                mime_type,
                file_name,
            },
            path,
        })
    }

    /// Delete a staged file now. Missing files are ignored.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "staged upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged upload"),
        }
    }

    /// Schedule deletion after a send finished: delayed when it was
    /// delivered, immediate when it failed.
    pub fn release(&self, path: PathBuf, delivered: bool) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let delay = if delivered {
            self.cleanup_delay
        } else {
            Duration::ZERO
        };
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            store.discard(&path).await;
        })
    }
}
