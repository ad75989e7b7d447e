//! Object storage locations.

use std::fmt;

use crate::error::{AthenaError, Result};

/// A parsed `s3://bucket/key` location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Location {
    pub bucket: String,
    /// Object key or key prefix, without a leading `/`.
    pub key: String,
}

impl S3Location {
    /// Parses an `s3://bucket/key` URI. The key may be empty and is kept
    /// verbatim, so spaces, `#` and `?` are part of it.
    pub fn parse(uri: &str) -> Result<Self> {
        let unknown = || AthenaError::value(format!("Unknown output location format: {uri}"));

        let rest = uri.strip_prefix("s3://").ok_or_else(unknown)?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(unknown());
        }

        Ok(Self::new(bucket, key))
    }

    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Returns the `s3://` URI of this location.
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// Returns the directory containing this object, with a trailing `/`.
    pub fn parent(&self) -> Self {
        let key = match self.key.trim_end_matches('/').rfind('/') {
            Some(i) => self.key[..=i].to_string(),
            None => String::new(),
        };
        Self::new(self.bucket.clone(), key)
    }

    /// Appends a path segment, inserting a `/` when needed.
    pub fn join(&self, segment: &str) -> Self {
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{segment}", self.key)
        } else {
            format!("{}/{segment}", self.key)
        };
        Self::new(self.bucket.clone(), key)
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}
