//! Qiniu Kodo storage backend.
//!
//! Talks to Qiniu's REST endpoints directly: form upload with an upload
//! token, management operations (stat/delete/move) with QBox request
//! signatures against the rs host, listing through the rsf host. Object
//! downloads go through the bucket's bound web domain.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_core::StorageScheme;

use crate::keys::normalize_key;
use crate::net;
use crate::registry::BucketRegistry;
use crate::traits::{ObjectInfo, Storage, StorageError, StorageResult};
use crate::uri::BucketUri;

type HmacSha1 = Hmac<Sha1>;

const MANAGE_HOST: &str = "https://rs.qiniuapi.com";
const LIST_HOST: &str = "https://rsf.qiniuapi.com";
const DEFAULT_UPLOAD_HOST: &str = "https://up.qiniup.com";
/// Upload token lifetime in seconds.
const UPLOAD_TOKEN_TTL: u64 = 3600;
/// Qiniu's status code for a missing object.
const STATUS_NO_SUCH_ENTRY: u16 = 612;
const LIST_PAGE_LIMIT: usize = 1000;

/// Upload host by Qiniu region name. Unknown or absent regions fall back
/// to the huadong host.
fn upload_host(region: Option<&str>) -> &'static str {
    match region {
        Some("huabei") => "https://up-z1.qiniup.com",
        Some("huanan") => "https://up-z2.qiniup.com",
        Some("beimei") => "https://up-na0.qiniup.com",
        Some("xinjiapo") => "https://up-as0.qiniup.com",
        _ => DEFAULT_UPLOAD_HOST,
    }
}

/// Settings for a Qiniu bucket.
#[derive(Clone, Debug, Default)]
pub struct QiniuConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: Option<String>,
    /// Public domain bound to the bucket; downloads and resolved URLs go
    /// through it.
    pub web_prefix: String,
}

/// Qiniu cloud storage backend.
#[derive(Clone)]
pub struct QiniuStorage {
    config: QiniuConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(default)]
    marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    key: String,
    fsize: u64,
    #[serde(rename = "putTime")]
    put_time: i64,
}

impl QiniuStorage {
    /// Construct a Qiniu backend and register its bucket for URI
    /// resolution.
    pub fn new(registry: &BucketRegistry, config: QiniuConfig) -> StorageResult<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(StorageError::ConfigError(
                "Qiniu credentials not configured".to_string(),
            ));
        }
        if config.bucket.is_empty() {
            return Err(StorageError::ConfigError(
                "Qiniu bucket not configured".to_string(),
            ));
        }
        if config.web_prefix.is_empty() {
            return Err(StorageError::ConfigError(
                "Qiniu web prefix not configured".to_string(),
            ));
        }

        let storage = QiniuStorage {
            config,
            client: reqwest::Client::new(),
        };
        let host = net::host_of(&storage.config.web_prefix);
        registry.register(StorageScheme::Qiniu.as_str(), &storage.config.bucket, &host);
        tracing::debug!(bucket = %storage.config.bucket, host = %host, "qiniu backend ready");
        Ok(storage)
    }

    /// URL-safe base64 HMAC-SHA1 signature over `data`.
    fn sign(&self, data: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(data);
        URL_SAFE.encode(mac.finalize().into_bytes())
    }

    /// Authorization header value for a management request.
    fn access_token(&self, path_and_query: &str) -> String {
        let data = format!("{}\n", path_and_query);
        format!(
            "QBox {}:{}",
            self.config.access_key,
            self.sign(data.as_bytes())
        )
    }

    /// Upload token scoped to the configured bucket.
    fn upload_token(&self) -> String {
        let deadline = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
            + UPLOAD_TOKEN_TTL;
        self.upload_token_at(deadline)
    }

    fn upload_token_at(&self, deadline: u64) -> String {
        let policy = serde_json::json!({
            "scope": self.config.bucket,
            "deadline": deadline,
        });
        let encoded_policy = URL_SAFE.encode(policy.to_string());
        let signature = self.sign(encoded_policy.as_bytes());
        format!(
            "{}:{}:{}",
            self.config.access_key, signature, encoded_policy
        )
    }

    /// `bucket:key` entry in URL-safe base64, as the management endpoints
    /// expect.
    fn encoded_entry(&self, key: &str) -> String {
        URL_SAFE.encode(format!("{}:{}", self.config.bucket, key))
    }

    /// Signed POST against the management host.
    async fn manage(&self, path: &str) -> StorageResult<reqwest::Response> {
        self.client
            .post(format!("{}{}", MANAGE_HOST, path))
            .header("Authorization", self.access_token(path))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }
}

#[async_trait]
impl Storage for QiniuStorage {
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let prefix = prefix.strip_prefix('/').unwrap_or(prefix);
        let limit = LIST_PAGE_LIMIT.to_string();

        let mut objects = Vec::new();
        let mut marker = String::new();
        loop {
            let mut params = vec![
                ("bucket", self.config.bucket.as_str()),
                ("limit", limit.as_str()),
            ];
            if !prefix.is_empty() {
                params.push(("prefix", prefix));
            }
            if !marker.is_empty() {
                params.push(("marker", marker.as_str()));
            }

            let url =
                reqwest::Url::parse_with_params(&format!("{}/list", LIST_HOST), &params)
                    .map_err(|e| StorageError::BackendError(e.to_string()))?;
            let path_and_query = format!("{}?{}", url.path(), url.query().unwrap_or(""));

            let response = self
                .client
                .post(url)
                .header("Authorization", self.access_token(&path_and_query))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .send()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    bucket = %self.config.bucket,
                    prefix = %prefix,
                    %status,
                    body = %body,
                    "qiniu list failed"
                );
                return Err(StorageError::BackendError(format!("{}: {}", status, body)));
            }

            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?;

            for item in page.items {
                let is_dir = item.key.ends_with('/');
                objects.push(ObjectInfo {
                    key: item.key,
                    size: item.fsize,
                    last_modified: put_time_to_datetime(item.put_time),
                    is_dir,
                });
            }

            match page.marker {
                Some(next) if !next.is_empty() => marker = next,
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let key = normalize_key(key)?;
        let url = net::join_url(&self.config.web_prefix, &key)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key));
        }
        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(
                bucket = %self.config.bucket,
                key = %key,
                %status,
                "qiniu download failed"
            );
            return Err(StorageError::DownloadFailed(status.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let size = data.len() as u64;

        let part = reqwest::multipart::Part::bytes(data).file_name(key.clone());
        let form = reqwest::multipart::Form::new()
            .text("token", self.upload_token())
            .text("key", key.clone())
            .part("file", part);

        let response = self
            .client
            .post(upload_host(self.config.region.as_deref()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                bucket = %self.config.bucket,
                key = %key,
                %status,
                body = %body,
                "qiniu upload failed"
            );
            return Err(StorageError::UploadFailed(format!("{}: {}", status, body)));
        }

        tracing::debug!(
            bucket = %self.config.bucket,
            key = %key,
            size_bytes = size,
            "qiniu upload successful"
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
        let path = format!(
            "/move/{}/{}/force/true",
            self.encoded_entry(&from),
            self.encoded_entry(&dest)
        );

        let response = self.manage(&path).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                bucket = %self.config.bucket,
                from = %from,
                dest = %dest,
                %status,
                body = %body,
                "qiniu move failed"
            );
            return Err(StorageError::BackendError(format!("{}: {}", status, body)));
        }

        tracing::debug!(
            bucket = %self.config.bucket,
            from = %from,
            dest = %dest,
            "qiniu move successful"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let key = normalize_key(key)?;
        let path = format!("/delete/{}", self.encoded_entry(&key));

        let response = self.manage(&path).await?;
        if response.status().as_u16() == STATUS_NO_SUCH_ENTRY {
            return Err(StorageError::NotFound(key));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                bucket = %self.config.bucket,
                key = %key,
                %status,
                body = %body,
                "qiniu delete failed"
            );
            return Err(StorageError::DeleteFailed(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let key = normalize_key(key)?;
        let path = format!("/stat/{}", self.encoded_entry(&key));

        let response = self.manage(&path).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.as_u16() == STATUS_NO_SUCH_ENTRY || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Err(StorageError::BackendError(status.to_string()))
    }

    fn bucket_name(&self) -> &str {
        &self.config.bucket
    }

    fn web_url(&self, key: &str) -> StorageResult<String> {
        let key = normalize_key(key)?;
        net::join_url(&self.config.web_prefix, &key)
    }

    fn bucket_uri(&self, key: &str) -> BucketUri {
        BucketUri::new(StorageScheme::Qiniu, &self.config.bucket, key)
    }

    fn scheme(&self) -> StorageScheme {
        StorageScheme::Qiniu
    }
}

/// Qiniu reports `putTime` in units of 100 ns since the epoch.
fn put_time_to_datetime(put_time: i64) -> DateTime<Utc> {
    let secs = put_time / 10_000_000;
    let nanos = ((put_time % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
