//! Local filesystem media store, served by the router under `/media`.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;

use crate::domain::providers::{MediaStore, StoredMedia};

/// Writes files below `root` and exposes them at `{public_base_url}/media/...`.
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, relative_path: &str, bytes: Vec<u8>) -> anyhow::Result<StoredMedia> {
        let relative = Path::new(relative_path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid media path: {relative_path}");
        }

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;

        Ok(StoredMedia {
            path: relative_path.to_string(),
            url: format!("{}/media/{relative_path}", self.public_base_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://localhost:8000/");

        let stored = store
            .save("generated/7/header.png", b"png".to_vec())
            .await
            .unwrap();

        assert_eq!(stored.path, "generated/7/header.png");
        assert_eq!(stored.url, "http://localhost:8000/media/generated/7/header.png");
        let written = std::fs::read(dir.path().join("generated/7/header.png")).unwrap();
        assert_eq!(written, b"png");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://localhost:8000");

        assert!(store.save("../outside.png", vec![1]).await.is_err());
        assert!(store.save("/etc/passwd", vec![1]).await.is_err());
    }
}
