//! Embedded-engine reader.
//!
//! Exports a query as parquet and reads the files through the embedded
//! engine: as a table, as local files, or loaded into a local database.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{apply_read_policy, Export};
use crate::aws::AwsCredentials;
use crate::config::EngineConfig;
use crate::convert::quote_string;
use crate::engine::{parquet_source, quote_ident, run_blocking, Engine};
use crate::error::{AthenaError, Result};
use crate::query::{ExecutionClient, ExecutionHandle};
use crate::result::ColumnarTable;
use crate::storage::{Manifest, ObjectStorage};

/// Outcome of a parallel load of export files into a local table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkLoadReport {
    pub table: String,
    /// Files whose rows are in the table, in completion order.
    pub loaded: Vec<String>,
    /// Files that failed to load, with the error message.
    pub failed: Vec<(String, String)>,
}

impl BulkLoadReport {
    /// Returns true if every file was loaded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reads exported parquet files through the embedded engine.
#[derive(Debug, Clone)]
pub struct EngineReader {
    client: ExecutionClient,
    storage: ObjectStorage,
    config: EngineConfig,
    credentials: Option<AwsCredentials>,
}

impl EngineReader {
    pub fn new(
        client: ExecutionClient,
        storage: ObjectStorage,
        config: EngineConfig,
        credentials: Option<AwsCredentials>,
    ) -> Self {
        Self {
            client,
            storage,
            config,
            credentials,
        }
    }

    pub fn client(&self) -> &ExecutionClient {
        &self.client
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn credentials(&self) -> Option<&AwsCredentials> {
        self.credentials.as_ref()
    }

    /// Opens an engine connection on the blocking pool and runs `work` on it.
    ///
    /// `database` of `None` uses an in-memory database.
    pub async fn with_engine<F, T>(&self, database: Option<PathBuf>, work: F) -> Result<T>
    where
        F: FnOnce(&Engine) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let config = self.config.clone();
        let credentials = self.credentials.clone();
        run_blocking(move || {
            let engine = Engine::open(database.as_deref(), &config, credentials.as_ref())?;
            work(&engine)
        })
        .await
    }

    fn database_path(&self, database: Option<&Path>) -> PathBuf {
        database.map_or_else(|| self.config.database.clone(), Path::to_path_buf)
    }

    async fn export_files(&self, query: &str, reuse: bool) -> Result<(ExecutionHandle, Manifest)> {
        let export = Export::run(&self.client, query, reuse).await?;
        let manifest = export.manifest(&self.storage).await?;
        Ok((export.handle, manifest))
    }

    /// Like `export_files`, but an export without files is an error.
    async fn export_source(&self, query: &str, reuse: bool) -> Result<(ExecutionHandle, Manifest)> {
        let (handle, manifest) = self.export_files(query, reuse).await?;
        if manifest.is_empty() {
            return Err(AthenaError::programming(format!(
                "Execution {} exported no files",
                handle.execution_id
            )));
        }
        Ok((handle, manifest))
    }

    /// Exports `query` and materializes its output through the engine.
    ///
    /// Execution failures always propagate. Failures reading the exported
    /// files follow the session's read-failure policy.
    pub async fn read(&self, query: &str, reuse: bool) -> Result<(ExecutionHandle, ColumnarTable)> {
        let export = Export::run(&self.client, query, reuse).await?;
        let outcome = match export.manifest(&self.storage).await {
            Ok(manifest) if manifest.is_empty() => Ok(ColumnarTable::empty()),
            Ok(manifest) => {
                let sql = format!("SELECT * FROM {}", parquet_source(&manifest.files));
                self.with_engine(None, move |engine| engine.query_table(&sql))
                    .await
            }
            Err(e) => Err(e),
        };
        let table = apply_read_policy(self.client.session().read_failure, query, outcome)?;
        info!(rows = table.num_rows(), columns = table.num_columns(), "Read exported table");
        Ok((export.handle, table))
    }

    /// Exports `query` and writes its output as a ZSTD parquet file.
    pub async fn to_parquet(&self, query: &str, reuse: bool, path: &Path) -> Result<()> {
        let (_, manifest) = self.export_source(query, reuse).await?;
        let sql = format!("SELECT * FROM {}", parquet_source(&manifest.files));
        let target = path.to_string_lossy().to_string();
        self.with_engine(None, move |engine| {
            engine.copy_to(&sql, &target, "FORMAT PARQUET, COMPRESSION ZSTD")
        })
        .await
    }

    /// Exports `query` and writes its output as delimited text.
    pub async fn to_csv(
        &self,
        query: &str,
        reuse: bool,
        path: &Path,
        delimiter: u8,
        header: bool,
    ) -> Result<()> {
        let (_, manifest) = self.export_source(query, reuse).await?;
        let sql = format!("SELECT * FROM {}", parquet_source(&manifest.files));
        let target = path.to_string_lossy().to_string();
        let options = format!(
            "FORMAT CSV, DELIMITER {}, HEADER {header}",
            quote_string(&char::from(delimiter).to_string())
        );
        self.with_engine(None, move |engine| engine.copy_to(&sql, &target, &options))
            .await
    }

    /// Exports `query` and replaces `table` in the local database with its
    /// output.
    pub async fn to_create_table_db(
        &self,
        query: &str,
        reuse: bool,
        table: &str,
        database: Option<&Path>,
    ) -> Result<()> {
        let (_, manifest) = self.export_source(query, reuse).await?;
        let name = quote_ident(table);
        let sql = format!(
            "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} AS SELECT * FROM {}",
            parquet_source(&manifest.files)
        );
        self.with_engine(Some(self.database_path(database)), move |engine| {
            engine.execute(&sql)
        })
        .await?;
        info!(table, files = manifest.len(), "Created local table");
        Ok(())
    }

    /// Exports `query` and loads its files into `table` in parallel.
    ///
    /// The table is recreated from the first file; the remaining files are
    /// spread over at most `workers` tasks. Each task opens one engine
    /// connection and inserts its files in turn, so no more than `workers`
    /// connections are open at once. A failed file does not stop the others;
    /// failures are logged and listed in the report.
    pub async fn to_partition_create_table_db(
        &self,
        query: &str,
        reuse: bool,
        table: &str,
        database: Option<&Path>,
        workers: Option<usize>,
    ) -> Result<BulkLoadReport> {
        let (_, manifest) = self.export_source(query, reuse).await?;
        let workers = workers.unwrap_or_else(|| self.config.effective_workers()).max(1);
        let name = quote_ident(table);

        let mut files = manifest.files.into_iter();
        let Some(first) = files.next() else {
            return Err(AthenaError::programming("Export produced no files"));
        };
        let rest: Vec<String> = files.collect();

        let create = format!(
            "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} AS SELECT * FROM {}",
            parquet_source(&[first.as_str()])
        );
        let groups = assign_files(rest, workers);
        let connections = groups.len();
        let tasks = self
            .with_engine(Some(self.database_path(database)), move |engine| {
                engine.execute(&create)?;
                groups
                    .into_iter()
                    .map(|files| Ok((files, engine.try_clone()?)))
                    .collect::<Result<Vec<(Vec<String>, Engine)>>>()
            })
            .await?;
        debug!(table, connections, "Opened worker connections");

        let outcomes: Vec<(String, Result<()>)> = stream::iter(tasks)
            .map(|(files, worker)| {
                let name = name.clone();
                async move {
                    let pending = files.clone();
                    match run_blocking(move || Ok(insert_files(&worker, &name, files))).await {
                        Ok(outcomes) => outcomes,
                        Err(e) => {
                            let message = e.to_string();
                            pending
                                .into_iter()
                                .map(|file| (file, Err(AthenaError::engine(message.clone()))))
                                .collect()
                        }
                    }
                }
            })
            .buffer_unordered(workers)
            .flat_map(stream::iter)
            .collect()
            .await;

        let mut report = BulkLoadReport {
            table: table.to_string(),
            loaded: vec![first],
            failed: Vec::new(),
        };
        for (file, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(table, %file, "Loaded file");
                    report.loaded.push(file);
                }
                Err(e) => {
                    warn!(table, %file, error = %e, "Failed to load file");
                    report.failed.push((file, e.to_string()));
                }
            }
        }

        info!(
            table,
            workers,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Parallel load finished"
        );
        Ok(report)
    }

    /// Exports `query` and appends its output to an existing local table.
    ///
    /// The database file and the table must already exist; this is checked
    /// before the query is submitted.
    pub async fn to_insert_table_db(
        &self,
        query: &str,
        reuse: bool,
        table: &str,
        database: Option<&Path>,
    ) -> Result<()> {
        let path = self.database_path(database);
        if !path.exists() {
            return Err(AthenaError::programming(format!(
                "Database {} does not exist",
                path.display()
            )));
        }

        let lookup = table.to_string();
        let exists = self
            .with_engine(Some(path.clone()), move |engine| engine.table_exists(&lookup))
            .await?;
        if !exists {
            return Err(AthenaError::programming(format!(
                "Table {table} does not exist in {}",
                path.display()
            )));
        }

        let (_, manifest) = self.export_source(query, reuse).await?;
        let sql = format!(
            "INSERT INTO {} SELECT * FROM {}",
            quote_ident(table),
            parquet_source(&manifest.files)
        );
        self.with_engine(Some(path), move |engine| engine.execute(&sql))
            .await?;
        info!(table, files = manifest.len(), "Appended to local table");
        Ok(())
    }
}

/// Deals files round-robin into at most `workers` non-empty groups.
fn assign_files(files: Vec<String>, workers: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = vec![Vec::new(); workers.max(1).min(files.len())];
    let count = groups.len();
    for (i, file) in files.into_iter().enumerate() {
        groups[i % count].push(file);
    }
    groups
}

/// Inserts each file into `table` on one connection, one outcome per file.
fn insert_files(engine: &Engine, table: &str, files: Vec<String>) -> Vec<(String, Result<()>)> {
    files
        .into_iter()
        .map(|file| {
            let sql = format!(
                "INSERT INTO {table} SELECT * FROM {}",
                parquet_source(&[file.as_str()])
            );
            let outcome = engine.execute(&sql);
            (file, outcome)
        })
        .collect()
}
