//! Storage for generated media files.

use async_trait::async_trait;

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    /// Path relative to the storage root.
    pub path: String,
    /// Public URL serving the file.
    pub url: String,
}

/// Persists binary media.
///
/// # Implementations
///
/// - [`crate::infrastructure::media::LocalMediaStore`] - local directory served at `/media`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save(&self, relative_path: &str, bytes: Vec<u8>) -> anyhow::Result<StoredMedia>;
}
