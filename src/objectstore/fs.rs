//! Filesystem-backed [`super::ObjectStore`]: writes each object under
//! `root/<key>`, using the configured bucket name only as metadata (there is
//! no real bucket boundary on a local filesystem).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::{ObjectStore, ObjectStoreError, StoredObject};

pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self { root: root.into(), bucket: bucket.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, ObjectStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        }
        fs::write(&path, bytes).await.map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        Ok(StoredObject {
            s3_key: key.to_string(),
            bucket: self.bucket.clone(),
            content_type: content_type.to_string(),
            file_size: bytes.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        fs::read(self.path_for(key)).await.map_err(|e| ObjectStoreError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_through_a_temp_directory() {
        let dir = std::env::temp_dir().join(format!("lessonforge-objectstore-test-{}", uuid::Uuid::new_v4()));
        let store = FsObjectStore::new(&dir, "test-bucket");
        let stored = store.put("images/cover.png", b"fake-bytes", "image/png").await.unwrap();
        assert_eq!(stored.bucket, "test-bucket");
        assert_eq!(stored.file_size, 10);

        let read_back = store.get("images/cover.png").await.unwrap();
        assert_eq!(read_back, b"fake-bytes");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn missing_key_is_an_io_error() {
        let dir = std::env::temp_dir().join(format!("lessonforge-objectstore-test-{}", uuid::Uuid::new_v4()));
        let store = FsObjectStore::new(&dir, "test-bucket");
        assert!(store.get("nothing-here").await.is_err());
    }
}
