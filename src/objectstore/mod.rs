//! Blob storage boundary for generated images and audio (`spec.md` §6).
//! [`fs::FsObjectStore`] is the reference implementation; a real deployment
//! would swap in an S3-backed one without touching callers, since they only
//! depend on the [`ObjectStore`] trait.

pub mod fs;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

pub use fs::FsObjectStore;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error, Diagnostic)]
pub enum ObjectStoreError {
    #[error("object store io error: {0}")]
    #[diagnostic(code(lessonforge::objectstore::io))]
    Io(String),
}

impl Classify for ObjectStoreError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::InternalError
    }
}

/// What a successful `put` reports back, matching the `{s3_key, bucket,
/// content_type, file_size}` shape `spec.md` §6 requires of blob rows.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub s3_key: String,
    pub bucket: String,
    pub content_type: String,
    pub file_size: u64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}
