//! Backend construction from configuration.

use std::sync::Arc;

use strata_core::{Config, StorageScheme};

use crate::minio::{MinioConfig, MinioStorage};
use crate::qiniu::{QiniuConfig, QiniuStorage};
use crate::registry::BucketRegistry;
use crate::s3::{S3Config, S3Storage};
use crate::traits::{Storage, StorageError, StorageResult};

/// Create the configured storage backend, registering it with `registry`
/// for URI resolution. Also applies the configured fallback URL, if any.
pub fn create_storage(
    config: &Config,
    registry: &BucketRegistry,
) -> StorageResult<Arc<dyn Storage>> {
    let scheme = config.storage_scheme.ok_or_else(|| {
        StorageError::ConfigError("STORAGE_SCHEME not configured".to_string())
    })?;

    if let Some(ref url) = config.fallback_url {
        registry.set_fallback_url(url.clone());
    }

    match scheme {
        StorageScheme::Minio => {
            let storage = MinioStorage::new(
                registry,
                MinioConfig {
                    endpoint: require(&config.minio_endpoint, "MINIO_ENDPOINT")?,
                    access_key: require(&config.minio_access_key, "MINIO_ACCESS_KEY")?,
                    secret_key: require(&config.minio_secret_key, "MINIO_SECRET_KEY")?,
                    bucket: require(&config.minio_bucket, "MINIO_BUCKET")?,
                    region: config.minio_region.clone(),
                    web_prefix: config.minio_web_prefix.clone(),
                    use_ssl: config.minio_use_ssl,
                },
            )?;
            Ok(Arc::new(storage))
        }

        StorageScheme::S3 => {
            let region = config.s3_region_or_aws().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let storage = S3Storage::new(
                registry,
                S3Config {
                    bucket: require(&config.s3_bucket, "S3_BUCKET")?,
                    region,
                    endpoint: config.s3_endpoint.clone(),
                    web_prefix: config.s3_web_prefix.clone(),
                    // Credentials come from the ambient AWS environment.
                    access_key: None,
                    secret_key: None,
                },
            )?;
            Ok(Arc::new(storage))
        }

        StorageScheme::Qiniu => {
            let storage = QiniuStorage::new(
                registry,
                QiniuConfig {
                    access_key: require(&config.qiniu_access_key, "QINIU_ACCESS_KEY")?,
                    secret_key: require(&config.qiniu_secret_key, "QINIU_SECRET_KEY")?,
                    bucket: require(&config.qiniu_bucket, "QINIU_BUCKET")?,
                    region: config.qiniu_region.clone(),
                    web_prefix: require(&config.qiniu_web_prefix, "QINIU_WEB_PREFIX")?,
                },
            )?;
            Ok(Arc::new(storage))
        }
    }
}

fn require(value: &Option<String>, name: &str) -> StorageResult<String> {
    value
        .clone()
        .ok_or_else(|| StorageError::ConfigError(format!("{} not configured", name)))
}
