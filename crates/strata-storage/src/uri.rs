//! Opaque bucket references with lazy URL resolution.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strata_core::StorageScheme;

use crate::registry::BucketRegistry;

/// An opaque `scheme://bucket/key` reference to a stored object.
///
/// The reference is a durable, shareable value: it can be serialized long
/// before or after the backend that answers it exists, and carries no
/// handle to any backend or registry. Resolution happens by value, at read
/// time, and never fails: empty references degrade to the configured
/// fallback URL, anything unparseable or unregistered degrades to the raw
/// string. References are routinely resolved deep inside the serialization
/// of larger structures, where an error would break unrelated output.
///
/// `Serialize` and `Display` emit the *resolved* URL; consumers of
/// serialized artifacts never see the raw form. `Deserialize` accepts the
/// raw form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct BucketUri(String);

impl BucketUri {
    /// Build a reference for `key` in `bucket` under `scheme`.
    pub fn new(scheme: StorageScheme, bucket: &str, key: &str) -> Self {
        BucketUri(format!(
            "{}://{}/{}",
            scheme,
            bucket,
            key.strip_prefix('/').unwrap_or(key)
        ))
    }

    /// The raw, unresolved reference value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is empty or whitespace-only.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Resolve against the process-wide registry.
    pub fn resolve(&self) -> String {
        self.resolve_in(BucketRegistry::global())
    }

    /// Resolve against a specific registry.
    pub fn resolve_in(&self, registry: &BucketRegistry) -> String {
        if self.is_empty() {
            return registry.fallback_url();
        }

        let parsed = match reqwest::Url::parse(&self.0) {
            Ok(url) => url,
            Err(_) => return self.0.clone(),
        };

        // The host component of a reference is the bucket name.
        let bucket = match parsed.host_str() {
            Some(host) => host,
            None => return self.0.clone(),
        };

        let host = match registry.lookup(parsed.scheme(), bucket) {
            Some(host) => host,
            None => return self.0.clone(),
        };

        match StorageScheme::from_str(parsed.scheme()) {
            Ok(_) => format!("http://{}/{}{}", host, bucket, parsed.path()),
            // A scheme outside the shipped set passes through unchanged
            // even when something registered under it.
            Err(_) => self.0.clone(),
        }
    }
}

impl From<String> for BucketUri {
    fn from(value: String) -> Self {
        BucketUri(value)
    }
}

impl From<&str> for BucketUri {
    fn from(value: &str) -> Self {
        BucketUri(value.to_string())
    }
}

impl fmt::Display for BucketUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolve())
    }
}

impl Serialize for BucketUri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.resolve())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_formats_reference() {
        let uri = BucketUri::new(StorageScheme::Minio, "media", "/avatars/a.png");
        assert_eq!(uri.as_str(), "minio://media/avatars/a.png");

        let uri = BucketUri::new(StorageScheme::Qiniu, "assets", "logo.svg");
        assert_eq!(uri.as_str(), "qiniu://assets/logo.svg");
    }

    #[test]
    fn test_resolves_registered_reference() {
        let registry = BucketRegistry::new();
        registry.register("s3", "photos", "cdn.example.com");

        let uri = BucketUri::from("s3://photos/avatar.png");
        assert_eq!(
            uri.resolve_in(&registry),
            "http://cdn.example.com/photos/avatar.png"
        );
    }

    #[test]
    fn test_resolves_nested_keys() {
        let registry = BucketRegistry::new();
        registry.register("minio", "media", "localhost:9000");

        let uri = BucketUri::from("minio://media/2024/01/photo.jpg");
        assert_eq!(
            uri.resolve_in(&registry),
            "http://localhost:9000/media/2024/01/photo.jpg"
        );
    }

    #[test]
    fn test_unregistered_reference_passes_through() {
        let registry = BucketRegistry::new();
        let uri = BucketUri::from("s3://unknownbucket/x.png");
        assert_eq!(uri.resolve_in(&registry), "s3://unknownbucket/x.png");
    }

    #[test]
    fn test_wrong_bucket_passes_through() {
        let registry = BucketRegistry::new();
        registry.register("s3", "photos", "cdn.example.com");
        let uri = BucketUri::from("s3://videos/clip.mp4");
        assert_eq!(uri.resolve_in(&registry), "s3://videos/clip.mp4");
    }

    #[test]
    fn test_empty_reference_resolves_to_fallback() {
        let registry = BucketRegistry::new();
        registry.set_fallback_url("http://local/default.png");

        assert_eq!(
            BucketUri::from("").resolve_in(&registry),
            "http://local/default.png"
        );
        assert_eq!(
            BucketUri::from("   ").resolve_in(&registry),
            "http://local/default.png"
        );
    }

    #[test]
    fn test_unparseable_reference_passes_through() {
        let registry = BucketRegistry::new();
        let uri = BucketUri::from("not a uri at all");
        assert_eq!(uri.resolve_in(&registry), "not a uri at all");
    }

    #[test]
    fn test_unknown_scheme_passes_through_even_when_registered() {
        let registry = BucketRegistry::new();
        registry.register("fastdfs", "files", "fs.example.com");

        let uri = BucketUri::from("fastdfs://files/report.pdf");
        assert_eq!(uri.resolve_in(&registry), "fastdfs://files/report.pdf");
    }

    #[test]
    fn test_deserializes_raw_form() {
        let uri: BucketUri = serde_json::from_str("\"s3://photos/avatar.png\"").unwrap();
        assert_eq!(uri.as_str(), "s3://photos/avatar.png");
    }

    // The only test that touches the process-wide registry; it uses a
    // bucket name no other test registers.
    #[test]
    fn test_serialize_and_display_emit_resolved_url() {
        BucketRegistry::global().register("minio", "uri-serde-bucket", "cdn.strata.test");

        let uri = BucketUri::new(StorageScheme::Minio, "uri-serde-bucket", "logo.png");
        let expected = "http://cdn.strata.test/uri-serde-bucket/logo.png";

        assert_eq!(uri.resolve(), expected);
        assert_eq!(uri.to_string(), expected);
        assert_eq!(
            serde_json::to_string(&uri).unwrap(),
            format!("\"{}\"", expected)
        );
    }
}
