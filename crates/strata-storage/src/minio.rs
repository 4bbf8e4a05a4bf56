use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload};
use std::path::Path;
use strata_core::StorageScheme;

use crate::keys::normalize_key;
use crate::net;
use crate::registry::BucketRegistry;
use crate::traits::{ObjectInfo, Storage, StorageError, StorageResult};
use crate::uri::BucketUri;

/// MinIO (S3-compatible) storage backend.
#[derive(Clone)]
pub struct MinioStorage {
    store: AmazonS3,
    config: MinioConfig,
}

/// Settings for a MinIO deployment.
#[derive(Clone, Debug, Default)]
pub struct MinioConfig {
    /// Backend endpoint, `host:port` or a full URL.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: Option<String>,
    /// Public URL prefix override; when set, resolved URLs use its host
    /// instead of the endpoint host.
    pub web_prefix: Option<String>,
    pub use_ssl: bool,
}

impl MinioConfig {
    /// Endpoint as a full URL; bare `host:port` endpoints get a scheme from
    /// the TLS flag.
    fn endpoint_url(&self) -> String {
        if net::has_url_scheme(&self.endpoint) {
            self.endpoint.clone()
        } else if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

impl MinioStorage {
    /// Construct a MinIO backend and register its bucket for URI
    /// resolution.
    pub fn new(registry: &BucketRegistry, config: MinioConfig) -> StorageResult<Self> {
        if config.endpoint.is_empty() {
            return Err(StorageError::ConfigError(
                "MinIO endpoint not configured".to_string(),
            ));
        }

        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint_url())
            .with_bucket_name(config.bucket.clone())
            .with_access_key_id(config.access_key.clone())
            .with_secret_access_key(config.secret_key.clone())
            .with_region(
                config
                    .region
                    .clone()
                    .unwrap_or_else(|| "us-east-1".to_string()),
            )
            .with_allow_http(!config.use_ssl)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let storage = MinioStorage { store, config };
        let host = storage.public_host();
        registry.register(
            StorageScheme::Minio.as_str(),
            &storage.config.bucket,
            &host,
        );
        tracing::debug!(bucket = %storage.config.bucket, host = %host, "minio backend ready");
        Ok(storage)
    }

    /// Host used for public URL resolution: the web-prefix override when
    /// present, else the backend endpoint.
    fn public_host(&self) -> String {
        match self.config.web_prefix {
            Some(ref prefix) => net::host_of(prefix),
            None => net::host_of(&self.config.endpoint_url()),
        }
    }
}

#[async_trait]
impl Storage for MinioStorage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let prefix = prefix.strip_prefix('/').unwrap_or(prefix);
        let prefix_path = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        let mut stream = self.store.list(prefix_path.as_ref());

        let mut objects = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    prefix = %prefix,
                    "minio list failed"
                );
                StorageError::BackendError(e.to_string())
            })?;
            objects.push(ObjectInfo::from(meta));
        }
        Ok(objects)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = normalize_key(key)?;
        let location = ObjectPath::from(key.as_str());

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.config.bucket,
                    key = %key,
                    "minio download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key.as_str());

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    size_bytes = size,
                    "minio upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = size,
            "minio upload successful"
        );
        Ok(())
    }

    async fn put_file(&self, key: &str, file: &Path) -> StorageResult<()> {
        let data = tokio::fs::read(file).await?;
        self.put(key, data).await
    }

    async fn move_object(&self, dest: &str, from: &str) -> StorageResult<()> {
        let dest = normalize_key(dest)?;
        let from = normalize_key(from)?;
        let from_path = ObjectPath::from(from.as_str());
        let dest_path = ObjectPath::from(dest.as_str());

        self.store
            .copy(&from_path, &dest_path)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        self.store
            .delete(&from_path)
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.config.bucket,
            from = %from,
            dest = %dest,
            "minio move successful"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let location = ObjectPath::from(key.as_str());

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.config.bucket,
                key = %key,
                "minio delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let key = normalize_key(key)?;
        let location = ObjectPath::from(key.as_str());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn bucket_name(&self) -> &str {
        &self.config.bucket
    }

    fn web_url(&self, key: &str) -> StorageResult<String> {
        let key = normalize_key(key)?;
        match self.config.web_prefix {
            Some(ref prefix) => net::join_url(prefix, &key),
            None => net::join_url(&self.config.endpoint_url(), &key),
        }
    }

    fn bucket_uri(&self, key: &str) -> BucketUri {
        BucketUri::new(StorageScheme::Minio, &self.config.bucket, key)
    }

    fn scheme(&self) -> StorageScheme {
        StorageScheme::Minio
    }
}
