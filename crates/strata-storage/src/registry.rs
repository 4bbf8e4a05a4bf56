//! Bucket registry mapping (scheme, bucket) to a reachable host.
//!
//! Backends register themselves at construction time; opaque references
//! look the host up by value at resolution time. A reference therefore
//! stays resolvable after the backend instance that issued it is gone, and
//! backends can be dropped and recreated freely.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use crate::net;

/// URL handed out for unresolvable references until configured otherwise.
const DEFAULT_FALLBACK_URL: &str = "http://127.0.0.1:9000/assets/unknown.png";

/// One registered bucket under a scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    pub bucket: String,
    pub host: String,
}

/// Registry of storage backends by scheme.
///
/// Thread-safe and cloneable; clones share the same underlying state, so a
/// single registry can be handed to every backend constructor and
/// resolution site. Most processes use the shared
/// [`BucketRegistry::global`] instance; tests construct isolated
/// registries.
#[derive(Clone)]
pub struct BucketRegistry {
    entries: Arc<RwLock<HashMap<String, Vec<BucketEntry>>>>,
    fallback_url: Arc<RwLock<String>>,
}

static GLOBAL: LazyLock<BucketRegistry> = LazyLock::new(BucketRegistry::new);

impl BucketRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            fallback_url: Arc::new(RwLock::new(DEFAULT_FALLBACK_URL.to_string())),
        }
    }

    /// The process-wide registry used by [`crate::BucketUri::resolve`] and
    /// by reference serialization.
    pub fn global() -> &'static BucketRegistry {
        &GLOBAL
    }

    /// Register a bucket/host pair under a scheme.
    ///
    /// First writer wins per scheme: if the scheme key is already present
    /// the call is a no-op, so later buckets registered under the same
    /// scheme stay invisible to [`lookup`](Self::lookup). Callers
    /// constructing several backends under one scheme should expect only
    /// the first to resolve.
    ///
    /// Any scheme string is accepted; schemes are not validated against the
    /// set of shipped backends.
    pub fn register(&self, scheme: &str, bucket: &str, host: &str) {
        if net::is_private_host(host) {
            tracing::debug!(scheme, bucket, host, "registered host is not publicly routable");
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.entry(scheme.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    scheme,
                    bucket,
                    host,
                    "scheme already registered, keeping existing entries"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![BucketEntry {
                    bucket: bucket.to_string(),
                    host: host.to_string(),
                }]);
                tracing::debug!(scheme, bucket, host, "bucket registered");
            }
        }
    }

    /// Host registered for `(scheme, bucket)`, if any. First bucket match
    /// wins within a scheme.
    pub fn lookup(&self, scheme: &str, bucket: &str) -> Option<String> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(scheme)?
            .iter()
            .find(|entry| entry.bucket == bucket)
            .map(|entry| entry.host.clone())
    }

    /// URL returned for references that cannot be resolved.
    pub fn fallback_url(&self) -> String {
        self.fallback_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Set the unresolvable-reference URL. Expected to be called once
    /// during startup, before resolution traffic begins; last writer wins.
    pub fn set_fallback_url(&self, url: impl Into<String>) {
        *self
            .fallback_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = url.into();
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Set the fallback URL on the process-wide registry.
pub fn set_fallback_url(url: impl Into<String>) {
    BucketRegistry::global().set_fallback_url(url);
}
