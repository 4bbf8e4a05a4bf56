//! Strata Storage Library
//!
//! A unified abstraction over remote object-storage backends (MinIO, S3,
//! Qiniu). Each backend implements the [`Storage`] trait and registers its
//! bucket and public host with a [`BucketRegistry`] at construction time.
//! Opaque [`BucketUri`] references resolve to fetchable URLs lazily, at
//! read time, without a live backend handle. References therefore outlive
//! the backends that issued them and can be serialized into API payloads
//! at any point.

pub mod factory;
pub(crate) mod keys;
pub mod minio;
pub mod net;
pub mod qiniu;
pub mod registry;
pub mod s3;
pub mod traits;
pub mod uri;

// Re-export commonly used types
pub use factory::create_storage;
pub use minio::{MinioConfig, MinioStorage};
pub use qiniu::{QiniuConfig, QiniuStorage};
pub use registry::{set_fallback_url, BucketEntry, BucketRegistry};
pub use s3::{S3Config, S3Storage};
pub use strata_core::StorageScheme;
pub use traits::{ObjectInfo, Storage, StorageError, StorageResult};
pub use uri::BucketUri;
