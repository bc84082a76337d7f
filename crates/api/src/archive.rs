//! Raw-image archive under the configured `img_path` directory.
//!
//! The store's image rows reference these files; a failed write is logged
//! and the row is still committed, so the archive is best-effort while the
//! identification itself is not.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Archive path for an image id: `<img_dir>/<id>.jpg`.
pub fn image_path(img_dir: &str, id: &str) -> String {
    format!("{img_dir}/{id}.jpg")
}

/// Decode and write an image buffer to its archive path.
pub async fn store(path: &str, img_buff: &str) {
    let bytes = match BASE64.decode(img_buff) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path, error = %e, "image buffer is not valid base64, skipping archive");
            return;
        }
    };

    if let Some(parent) = Path::new(path).parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(path, error = %e, "unable to create archive directory");
            return;
        }
    }

    match tokio::fs::write(path, &bytes).await {
        Ok(()) => tracing::debug!(path, size = bytes.len(), "image archived"),
        Err(e) => tracing::warn!(path, error = %e, "unable to archive image"),
    }
}
