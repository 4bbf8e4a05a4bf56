//! Configuration module
//!
//! Environment-driven settings for backend selection, per-backend
//! credentials and endpoints, and the URI-resolution fallback URL.

use std::env;
use std::str::FromStr;

use crate::scheme::StorageScheme;

/// Application configuration for storage backends.
///
/// All backend settings are optional; the factory validates that the
/// selected backend's required settings are present.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Which backend the factory constructs.
    pub storage_scheme: Option<StorageScheme>,
    /// URL returned when an opaque bucket reference cannot be resolved.
    pub fallback_url: Option<String>,

    // MinIO configuration
    pub minio_endpoint: Option<String>,
    pub minio_access_key: Option<String>,
    pub minio_secret_key: Option<String>,
    pub minio_bucket: Option<String>,
    pub minio_region: Option<String>,
    pub minio_web_prefix: Option<String>,
    pub minio_use_ssl: bool,

    // S3 configuration (AWS or S3-compatible providers)
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub s3_web_prefix: Option<String>,
    pub aws_region: Option<String>,

    // Qiniu configuration
    pub qiniu_access_key: Option<String>,
    pub qiniu_secret_key: Option<String>,
    pub qiniu_bucket: Option<String>,
    pub qiniu_region: Option<String>,
    pub qiniu_web_prefix: Option<String>,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_scheme = match env_opt("STORAGE_SCHEME") {
            Some(v) => Some(StorageScheme::from_str(&v)?),
            None => None,
        };

        Ok(Config {
            storage_scheme,
            fallback_url: env_opt("STORAGE_FALLBACK_URL"),

            minio_endpoint: env_opt("MINIO_ENDPOINT"),
            minio_access_key: env_opt("MINIO_ACCESS_KEY"),
            minio_secret_key: env_opt("MINIO_SECRET_KEY"),
            minio_bucket: env_opt("MINIO_BUCKET"),
            minio_region: env_opt("MINIO_REGION"),
            minio_web_prefix: env_opt("MINIO_WEB_PREFIX"),
            minio_use_ssl: env_flag("MINIO_USE_SSL"),

            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_web_prefix: env_opt("S3_WEB_PREFIX"),
            aws_region: env_opt("AWS_REGION"),

            qiniu_access_key: env_opt("QINIU_ACCESS_KEY"),
            qiniu_secret_key: env_opt("QINIU_SECRET_KEY"),
            qiniu_bucket: env_opt("QINIU_BUCKET"),
            qiniu_region: env_opt("QINIU_REGION"),
            qiniu_web_prefix: env_opt("QINIU_WEB_PREFIX"),
        })
    }

    /// Region for the S3 backend, falling back to the ambient AWS region.
    pub fn s3_region_or_aws(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> bool {
    matches!(
        env::var(key).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_opt_filters_empty() {
        env::set_var("STRATA_TEST_EMPTY", "");
        env::set_var("STRATA_TEST_SET", "value");
        assert_eq!(env_opt("STRATA_TEST_EMPTY"), None);
        assert_eq!(env_opt("STRATA_TEST_MISSING"), None);
        assert_eq!(env_opt("STRATA_TEST_SET"), Some("value".to_string()));
    }

    #[test]
    fn test_env_flag_accepts_common_truthy_values() {
        env::set_var("STRATA_TEST_FLAG_ON", "true");
        env::set_var("STRATA_TEST_FLAG_ONE", "1");
        env::set_var("STRATA_TEST_FLAG_OFF", "false");
        assert!(env_flag("STRATA_TEST_FLAG_ON"));
        assert!(env_flag("STRATA_TEST_FLAG_ONE"));
        assert!(!env_flag("STRATA_TEST_FLAG_OFF"));
        assert!(!env_flag("STRATA_TEST_FLAG_MISSING"));
    }

    #[test]
    fn test_s3_region_falls_back_to_aws_region() {
        let cfg = Config {
            aws_region: Some("us-east-1".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.s3_region_or_aws(), Some("us-east-1"));

        let cfg = Config {
            s3_region: Some("cn-hangzhou".to_string()),
            aws_region: Some("us-east-1".to_string()),
            ..Default::default()
        };
        assert_eq!(cfg.s3_region_or_aws(), Some("cn-hangzhou"));
    }
}
