//! Filesystem store for uploaded media blobs.
//!
//! Files land under the store root in a per-purpose subdirectory
//! (`bot-media` for command responses, `broadcast-media` for jobs) and are
//! referenced everywhere else by their relative path. Names are generated,
//! never taken from the upload, so admin input cannot traverse outside the
//! root.

use std::path::{Path, PathBuf};

use crate::core::error::{AppError, AppResult};

/// Subdirectory for command response media.
pub const COMMAND_MEDIA_DIR: &str = "bot-media";
/// Subdirectory for broadcast media.
pub const BROADCAST_MEDIA_DIR: &str = "broadcast-media";

/// Blob store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Saves bytes under a generated name and returns the relative path.
    ///
    /// The original filename contributes only its extension.
    pub fn store(&self, dir: &str, original_name: &str, bytes: &[u8]) -> AppResult<String> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let relative = format!("{dir}/{}{ext}", uuid::Uuid::new_v4());

        let full = self.root.join(&relative);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;

        Ok(relative)
    }

    /// Absolute path for a stored relative path, refusing traversal.
    pub fn full_path(&self, relative: &str) -> AppResult<PathBuf> {
        let rel = Path::new(relative);
        if rel.is_absolute() || rel.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(AppError::Validation(format!("invalid media path: {relative}")));
        }
        Ok(self.root.join(rel))
    }

    /// Removes a stored file; missing files are not an error.
    pub fn delete(&self, relative: &str) {
        match self.full_path(relative) {
            Ok(full) => {
                if let Err(e) = std::fs::remove_file(&full) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Failed to delete media file {}: {}", full.display(), e);
                    }
                }
            }
            Err(e) => log::warn!("Refusing to delete media: {}", e),
        }
    }

    /// True when the stored file is present on disk.
    pub fn exists(&self, relative: &str) -> bool {
        self.full_path(relative).map(|p| p.exists()).unwrap_or(false)
    }
}
