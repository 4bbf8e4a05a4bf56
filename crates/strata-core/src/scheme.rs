use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage provider schemes
///
/// Identifies which provider backs a bucket. The bucket registry keys on
/// plain strings so future providers can register without touching this
/// enum; the enum covers the backends shipped in this workspace and is used
/// by configuration, the factory, and URL synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScheme {
    Minio,
    S3,
    Qiniu,
}

impl StorageScheme {
    /// The scheme tag as it appears in `scheme://bucket/key` references.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageScheme::Minio => "minio",
            StorageScheme::S3 => "s3",
            StorageScheme::Qiniu => "qiniu",
        }
    }
}

impl FromStr for StorageScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minio" => Ok(StorageScheme::Minio),
            "s3" => Ok(StorageScheme::S3),
            "qiniu" => Ok(StorageScheme::Qiniu),
            _ => Err(anyhow::anyhow!("Invalid storage scheme: {}", s)),
        }
    }
}

impl Display for StorageScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
