//! Uploaded image payloads.
//!
//! An `UploadedImage` owns its bytes; releasing it is the owning scope's
//! drop, so there is no separate handle to revoke.

use crate::error::{MoriatiError, Result};
use base64::Engine;
use chrono::Utc;
use std::path::Path;

/// An image collected from the user, with its raw bytes and declared mime type.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Derived from the file name and submission time; not guaranteed unique.
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadedImage {
    /// Create an uploaded image from raw bytes
    pub fn new(name: &str, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", name, Utc::now().timestamp_millis()),
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Read an image from disk, deriving the mime type from the extension.
    ///
    /// PNG, JPEG, and WEBP are accepted — the formats the uploader accepts.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = mime_type_for(path).ok_or_else(|| {
            MoriatiError::ImageError(format!("Unsupported image type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path)?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("image");

        Ok(Self::new(name, bytes, mime_type))
    }

    /// Base64 of the raw bytes, the portable form the AI provider accepts
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
