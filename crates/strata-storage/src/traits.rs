//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement, the shared error type, and the object descriptor returned by
//! listings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use strata_core::StorageScheme;
use thiserror::Error;

use crate::uri::BucketUri;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Descriptor for one stored object, as returned by [`Storage::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Directory placeholder objects (keys ending in `/`).
    pub is_dir: bool,
}

impl From<object_store::ObjectMeta> for ObjectInfo {
    fn from(meta: object_store::ObjectMeta) -> Self {
        let key = meta.location.to_string();
        let is_dir = key.ends_with('/');
        ObjectInfo {
            key,
            size: meta.size,
            last_modified: meta.last_modified,
            is_dir,
        }
    }
}

/// Storage abstraction trait
///
/// All backends (MinIO, S3, Qiniu) implement this trait. Callers pick a
/// backend at construction time and interact only with this contract; the
/// bucket registry and opaque references depend on it and never on a
/// concrete backend type.
///
/// Post-conditions every backend upholds: a successful `remove` makes a
/// subsequent `exists` on the same key return false, and a successful `put`
/// makes a subsequent `get` return the exact bytes written.
#[async_trait]
pub trait Storage: Send + Sync {
    /// List objects under a key prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Fetch an object's contents.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store a byte buffer under a key.
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Upload a local file under a key.
    async fn put_file(&self, key: &str, file: &Path) -> StorageResult<()>;

    /// Move an object to a new key within the same bucket.
    async fn move_object(&self, dest: &str, from: &str) -> StorageResult<()>;

    /// Remove an object.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Whether an object exists under the key.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// The bucket this backend operates on.
    fn bucket_name(&self) -> &str;

    /// Direct web URL for an object, derived from the backend's public
    /// prefix or endpoint.
    fn web_url(&self, key: &str) -> StorageResult<String>;

    /// Opaque `scheme://bucket/key` reference for an object. Resolution to
    /// a fetchable URL is deferred until read time.
    fn bucket_uri(&self, key: &str) -> BucketUri;

    /// The scheme tag this backend registers under.
    fn scheme(&self) -> StorageScheme;
}
