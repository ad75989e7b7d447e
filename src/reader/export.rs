//! Export of query output to object storage.
//!
//! A query is wrapped in an `UNLOAD` statement that writes parquet files to a
//! fresh prefix under the staging directory. The service then reports a
//! manifest listing the written files.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AthenaError, Result};
use crate::query::{ExecutionClient, ExecutionHandle};
use crate::storage::{Manifest, ObjectStorage};

pub const UNLOAD_FORMAT: &str = "PARQUET";
pub const UNLOAD_COMPRESSION: &str = "ZSTD";

/// Fresh export prefix: `{staging}unload/{YYYYMMDD}/{id}/`.
pub fn unload_location(staging_dir: &str, now: DateTime<Utc>, id: Uuid) -> String {
    format!("{staging_dir}unload/{}/{id}/", now.format("%Y%m%d"))
}

/// Wraps a query in an `UNLOAD` to `location`.
pub fn unload_statement(query: &str, location: &str) -> String {
    format!(
        "UNLOAD (\n\t{}\n)\nTO '{location}'\nWITH (\n\tformat = '{UNLOAD_FORMAT}',\n\tcompression = '{UNLOAD_COMPRESSION}'\n)",
        query.trim()
    )
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct Export {
    pub handle: ExecutionHandle,
    /// Prefix the files were written under.
    pub location: String,
}

impl Export {
    /// Submits `query` as an export and waits for it to finish.
    pub async fn run(client: &ExecutionClient, query: &str, reuse: bool) -> Result<Self> {
        let location = unload_location(client.staging_dir(), Utc::now(), Uuid::new_v4());
        let handle = client
            .submit(&unload_statement(query, &location), reuse)
            .await?;
        debug!(execution_id = %handle.execution_id, %location, "Export finished");
        Ok(Self { handle, location })
    }

    /// Reads the manifest of the exported files.
    pub async fn manifest(&self, storage: &ObjectStorage) -> Result<Manifest> {
        let uri = self
            .handle
            .manifest_location()
            .ok_or_else(|| AthenaError::programming("Data location does not exist"))?;
        let manifest = storage.read_manifest(uri).await?;
        debug!(files = manifest.len(), "Read export manifest");
        Ok(manifest)
    }
}
