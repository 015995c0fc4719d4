//! Object storage for uploaded files and generated artifacts.
//!
//! Objects are addressed by relative keys such as `uploads/<owner>/<file>`.
//! Records refer to them through locations of the form `storage://<key>`.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

/// Location prefix for objects held in [`Storage`]
pub const LOCATION_SCHEME: &str = "storage://";

/// Storage abstraction
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write an object, replacing any existing one. Returns its location.
    async fn put(&self, key: &str, data: Bytes) -> Result<String, StorageError>;

    /// Read an object
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Build the location string for a key
pub fn location_for(key: &str) -> String {
    format!("{LOCATION_SCHEME}{key}")
}

/// Key of a `storage://` location, or `None` for any other origin
pub fn key_from_location(location: &str) -> Option<&str> {
    location.strip_prefix(LOCATION_SCHEME)
}

/// Reduce a client-supplied file name to a safe single path segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Local filesystem storage rooted at one directory
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Resolve a key to a path under the base directory
    fn key_to_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain || key.contains("..") {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<String, StorageError> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        tracing::debug!(key = %key, size_bytes = data.len(), "Stored object");
        Ok(location_for(key))
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.key_to_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let location = storage
            .put("uploads/alice/a.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(location, "storage://uploads/alice/a.txt");
        assert_eq!(
            storage.get("uploads/alice/a.txt").await.unwrap(),
            Bytes::from_static(b"hello")
        );

        storage.delete("uploads/alice/a.txt").await.unwrap();
        assert!(matches!(
            storage.get("uploads/alice/a.txt").await,
            Err(StorageError::NotFound { .. })
        ));
        // Second delete is a no-op
        storage.delete("uploads/alice/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        for key in ["../secret", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(storage.get(key).await, Err(StorageError::InvalidKey { .. })),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_location_round_trip() {
        assert_eq!(key_from_location("storage://a/b.pdf"), Some("a/b.pdf"));
        assert_eq!(key_from_location("https://example.com/a.pdf"), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("My Report (v2).pdf"), "My_Report__v2_.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
    }
}
