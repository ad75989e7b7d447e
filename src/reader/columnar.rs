//! Object-export reader.
//!
//! Exports a query as parquet, then downloads and decodes every file of the
//! export manifest into one Arrow table.

use std::path::Path;

use futures::future::try_join_all;
use tracing::info;

use super::{apply_read_policy, Export};
use crate::error::Result;
use crate::query::{ExecutionClient, ExecutionHandle};
use crate::result::{read_parquet_bytes, write_csv_file, write_parquet_file, ColumnarTable};
use crate::storage::{Manifest, ObjectStorage, S3Location};

/// Reads exported parquet files into Arrow.
#[derive(Debug, Clone)]
pub struct ColumnarReader {
    client: ExecutionClient,
    storage: ObjectStorage,
}

impl ColumnarReader {
    pub fn new(client: ExecutionClient, storage: ObjectStorage) -> Self {
        Self { client, storage }
    }

    pub fn client(&self) -> &ExecutionClient {
        &self.client
    }

    /// Exports `query` and materializes its output.
    ///
    /// Execution failures always propagate. Failures reading the exported
    /// files follow the session's read-failure policy.
    pub async fn read(&self, query: &str, reuse: bool) -> Result<(ExecutionHandle, ColumnarTable)> {
        let export = Export::run(&self.client, query, reuse).await?;
        let outcome = self.read_export(&export).await;
        let table = apply_read_policy(self.client.session().read_failure, query, outcome)?;
        info!(rows = table.num_rows(), columns = table.num_columns(), "Read exported table");
        Ok((export.handle, table))
    }

    async fn read_export(&self, export: &Export) -> Result<ColumnarTable> {
        let manifest = export.manifest(&self.storage).await?;
        read_manifest_files(&self.storage, &manifest).await
    }

    /// Exports `query` and writes its output as a ZSTD parquet file.
    pub async fn to_parquet(&self, query: &str, reuse: bool, path: &Path) -> Result<ColumnarTable> {
        let (_, table) = self.read(query, reuse).await?;
        write_parquet_file(&table, path)?;
        Ok(table)
    }

    /// Exports `query` and writes its output as delimited text.
    pub async fn to_csv(
        &self,
        query: &str,
        reuse: bool,
        path: &Path,
        delimiter: u8,
        header: bool,
    ) -> Result<ColumnarTable> {
        let (_, table) = self.read(query, reuse).await?;
        write_csv_file(&table, path, delimiter, header)?;
        Ok(table)
    }
}

/// Downloads and decodes every manifest file concurrently.
///
/// The table takes its schema from the first file. An empty manifest yields
/// an empty table.
pub(crate) async fn read_manifest_files(
    storage: &ObjectStorage,
    manifest: &Manifest,
) -> Result<ColumnarTable> {
    let tables = try_join_all(manifest.files.iter().map(|file| async move {
        let location = S3Location::parse(file)?;
        let bytes = storage.read_object(&location).await?;
        read_parquet_bytes(bytes)
    }))
    .await?;

    let Some(schema) = tables.first().map(|t| t.schema().clone()) else {
        return Ok(ColumnarTable::empty());
    };
    let batches = tables.into_iter().flat_map(ColumnarTable::into_batches).collect();
    Ok(ColumnarTable::new(schema, batches))
}
