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

/// S3 storage backend (AWS or S3-compatible providers).
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    config: S3Config,
}

/// Settings for an S3 bucket.
///
/// Credentials are optional here; when absent the builder picks them up
/// from the ambient AWS environment.
#[derive(Clone, Debug, Default)]
pub struct S3Config {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers
    /// (e.g. "https://oss-cn-hangzhou.aliyuncs.com").
    pub endpoint: Option<String>,
    /// Public URL prefix override for resolved URLs.
    pub web_prefix: Option<String>,
}

impl S3Storage {
    /// Construct an S3 backend and register its bucket for URI resolution.
    pub fn new(registry: &BucketRegistry, config: S3Config) -> StorageResult<Self> {
        if config.bucket.is_empty() {
            return Err(StorageError::ConfigError(
                "S3 bucket not configured".to_string(),
            ));
        }
        if config.region.is_empty() {
            return Err(StorageError::ConfigError(
                "S3 region not configured".to_string(),
            ));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref access_key) = config.access_key {
            builder = builder.with_access_key_id(access_key.clone());
        }
        if let Some(ref secret_key) = config.secret_key {
            builder = builder.with_secret_access_key(secret_key.clone());
        }
        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let storage = S3Storage { store, config };
        let host = storage.public_host();
        registry.register(StorageScheme::S3.as_str(), &storage.config.bucket, &host);
        tracing::debug!(bucket = %storage.config.bucket, host = %host, "s3 backend ready");
        Ok(storage)
    }

    /// Host used for public URL resolution: web-prefix override, else the
    /// custom endpoint, else the standard virtual-hosted AWS host.
    fn public_host(&self) -> String {
        if let Some(ref prefix) = self.config.web_prefix {
            net::host_of(prefix)
        } else if let Some(ref endpoint) = self.config.endpoint {
            net::host_of(endpoint)
        } else {
            format!(
                "{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            )
        }
    }

    /// Public URL for an object.
    ///
    /// S3-compatible providers get path-style URLs built from the endpoint;
    /// plain AWS gets the virtual-hosted form.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.config.endpoint {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.config.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, key
            )
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let prefix = prefix.strip_prefix('/').unwrap_or(prefix);
        let prefix_path = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        let mut stream = self.store.list(prefix_path.as_ref());

        let mut objects = Vec::new();
        while let Some(meta) = stream.next().await {
            match meta {
                Ok(meta) => objects.push(ObjectInfo::from(meta)),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %self.config.bucket,
                        prefix = %prefix,
                        "s3 list failed"
                    );
                    return Err(StorageError::BackendError(e.to_string()));
                }
            }
        }
        Ok(objects)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = normalize_key(key)?;
        let location = ObjectPath::from(key.as_str());

        match self.store.get(&location).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    "s3 download failed"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        }
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key.as_str());

        match self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
        {
            Ok(_) => {
                tracing::debug!(
                    bucket = %self.config.bucket,
                    key = %key,
                    size_bytes = size,
                    "s3 upload successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    size_bytes = size,
                    "s3 upload failed"
                );
                Err(StorageError::UploadFailed(e.to_string()))
            }
        }
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
            "s3 move successful"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let location = ObjectPath::from(key.as_str());

        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.config.bucket,
                    key = %key,
                    "s3 delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
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
            None => Ok(self.generate_url(&key)),
        }
    }

    fn bucket_uri(&self, key: &str) -> BucketUri {
        BucketUri::new(StorageScheme::S3, &self.config.bucket, key)
    }

    fn scheme(&self) -> StorageScheme {
        StorageScheme::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            access_key: Some("AKIAEXAMPLE".to_string()),
            secret_key: Some("secret".to_string()),
            bucket: "photos".to_string(),
            region: "us-east-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_registers_virtual_hosted_host() {
        let registry = BucketRegistry::new();
        let storage = S3Storage::new(&registry, test_config()).unwrap();

        assert_eq!(storage.bucket_name(), "photos");
        assert_eq!(
            registry.lookup("s3", "photos").as_deref(),
            Some("photos.s3.us-east-1.amazonaws.com")
        );
    }

    #[test]
    fn test_custom_endpoint_registers_endpoint_host() {
        let registry = BucketRegistry::new();
        let config = S3Config {
            endpoint: Some("https://oss-cn-hangzhou.aliyuncs.com".to_string()),
            region: "cn-hangzhou".to_string(),
            ..test_config()
        };
        S3Storage::new(&registry, config).unwrap();

        assert_eq!(
            registry.lookup("s3", "photos").as_deref(),
            Some("oss-cn-hangzhou.aliyuncs.com")
        );
    }

    #[test]
    fn test_web_prefix_takes_precedence() {
        let registry = BucketRegistry::new();
        let config = S3Config {
            endpoint: Some("https://oss-cn-hangzhou.aliyuncs.com".to_string()),
            web_prefix: Some("http://cdn.example.com".to_string()),
            ..test_config()
        };
        S3Storage::new(&registry, config).unwrap();

        assert_eq!(
            registry.lookup("s3", "photos").as_deref(),
            Some("cdn.example.com")
        );
    }

    #[test]
    fn test_missing_bucket_is_config_error() {
        let registry = BucketRegistry::new();
        let config = S3Config {
            bucket: String::new(),
            ..test_config()
        };
        assert!(matches!(
            S3Storage::new(&registry, config),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn test_web_url_virtual_hosted() {
        let registry = BucketRegistry::new();
        let storage = S3Storage::new(&registry, test_config()).unwrap();

        assert_eq!(
            storage.web_url("avatar.png").unwrap(),
            "https://photos.s3.us-east-1.amazonaws.com/avatar.png"
        );
    }

    #[test]
    fn test_web_url_path_style_for_custom_endpoint() {
        let registry = BucketRegistry::new();
        let config = S3Config {
            endpoint: Some("https://oss-cn-hangzhou.aliyuncs.com/".to_string()),
            ..test_config()
        };
        let storage = S3Storage::new(&registry, config).unwrap();

        assert_eq!(
            storage.web_url("avatar.png").unwrap(),
            "https://oss-cn-hangzhou.aliyuncs.com/photos/avatar.png"
        );
    }

    #[test]
    fn test_bucket_uri_format() {
        let registry = BucketRegistry::new();
        let storage = S3Storage::new(&registry, test_config()).unwrap();

        assert_eq!(
            storage.bucket_uri("avatar.png").as_str(),
            "s3://photos/avatar.png"
        );
    }
}
