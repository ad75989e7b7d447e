//! Object storage access.
//!
//! Reads manifests and exported files, and tears down table prefixes. Stores
//! are obtained per bucket from a `StorageFactory`, so tests can substitute
//! an in-memory store for S3.

mod location;
mod manifest;

pub use location::S3Location;
pub use manifest::Manifest;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, warn};

use crate::aws::AwsCredentials;
use crate::error::{AthenaError, Result};

/// Produces an object store for a bucket.
pub trait StorageFactory: Send + Sync + Debug {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

/// S3 stores built from resolved credentials.
#[derive(Debug, Clone, Default)]
pub struct S3StorageFactory {
    credentials: Option<AwsCredentials>,
    region: Option<String>,
    endpoint: Option<String>,
}

impl S3StorageFactory {
    pub fn new(credentials: Option<AwsCredentials>) -> Self {
        let region = credentials.as_ref().and_then(|c| c.region.clone());
        Self {
            credentials,
            region,
            endpoint: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl StorageFactory for S3StorageFactory {
    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = &self.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(creds) = &self.credentials {
            builder = builder
                .with_access_key_id(&creds.access_key_id)
                .with_secret_access_key(&creds.secret_access_key);
            if let Some(token) = &creds.session_token {
                builder = builder.with_token(token);
            }
        }

        Ok(Arc::new(builder.build()?))
    }
}

/// Serves one store for every bucket. Used with `InMemory` in tests and for
/// pre-built stores.
#[derive(Debug, Clone)]
pub struct StaticStorageFactory {
    store: Arc<dyn ObjectStore>,
}

impl StaticStorageFactory {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// A factory over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }
}

impl StorageFactory for StaticStorageFactory {
    fn store(&self, _bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::clone(&self.store))
    }
}

/// Object storage operations used by the readers and the DDL writer.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    factory: Arc<dyn StorageFactory>,
}

impl ObjectStorage {
    pub fn new(factory: Arc<dyn StorageFactory>) -> Self {
        Self { factory }
    }

    /// Storage backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(StaticStorageFactory::in_memory()))
    }

    fn resolve(&self, location: &S3Location) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        let store = self.factory.store(&location.bucket)?;
        Ok((store, object_path(&location.key)?))
    }

    /// Reads a whole object.
    pub async fn read_object(&self, location: &S3Location) -> Result<Bytes> {
        let (store, path) = self.resolve(location)?;
        debug!("Reading {location}");
        let bytes = store.get(&path).await?.bytes().await?;
        Ok(bytes)
    }

    /// Writes a whole object.
    pub async fn put_object(&self, location: &S3Location, data: Bytes) -> Result<()> {
        let (store, path) = self.resolve(location)?;
        store.put(&path, PutPayload::from(data)).await?;
        Ok(())
    }

    /// Reads and parses the manifest at `uri`.
    pub async fn read_manifest(&self, uri: &str) -> Result<Manifest> {
        let location = S3Location::parse(uri)?;
        let bytes = self.read_object(&location).await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| AthenaError::storage(format!("Manifest {uri} is not UTF-8: {e}")))?;
        Ok(Manifest::parse(text))
    }

    /// Lists the objects under a prefix.
    pub async fn list_prefix(&self, prefix: &S3Location) -> Result<Vec<S3Location>> {
        let (store, path) = self.resolve(prefix)?;
        let objects: Vec<_> = store.list(Some(&path)).try_collect().await?;
        Ok(objects
            .into_iter()
            .map(|meta| S3Location::new(prefix.bucket.clone(), meta.location.to_string()))
            .collect())
    }

    /// Deletes every object under a prefix and returns how many were deleted.
    ///
    /// A prefix with no objects is a no-op. Deletes are batched by the store.
    pub async fn delete_prefix(&self, prefix: &S3Location) -> Result<usize> {
        let objects = self.list_prefix(prefix).await?;
        if objects.is_empty() {
            debug!("No objects under {prefix}; nothing to delete");
            return Ok(0);
        }

        if prefix.key.trim_matches('/').is_empty() {
            warn!("Deleting {} objects at the root of bucket {}", objects.len(), prefix.bucket);
        } else {
            warn!("Deleting {} objects under {prefix}", objects.len());
        }

        let (store, _) = self.resolve(prefix)?;
        let paths = objects
            .iter()
            .map(|object| object_path(&object.key))
            .collect::<Result<Vec<_>>>()?;
        let deleted: Vec<ObjectPath> = store
            .delete_stream(stream::iter(paths.into_iter().map(Ok::<_, object_store::Error>)).boxed())
            .try_collect()
            .await?;

        debug!("Deleted {} objects under {prefix}", deleted.len());
        Ok(deleted.len())
    }
}

/// Maps a raw object key to a store path without re-encoding it.
fn object_path(key: &str) -> Result<ObjectPath> {
    ObjectPath::parse(key)
        .map_err(|e| AthenaError::value(format!("Invalid object key {key}: {e}")))
}
