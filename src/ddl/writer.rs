//! Warehouse table writes.
//!
//! Local data (an Arrow table or parquet files) is written to object storage
//! by the embedded engine, registered as an external table, and optionally
//! promoted into a versioned table or merged into one.
//!
//! Each write runs as a sequence of named steps recorded in a `WriteReport`.
//! A failed required step skips the steps after it; cleanup steps always run.

use std::fmt;
use std::future::Future;
use std::path::Path;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::statements::{
    create_external_table, create_versioned_table, drop_table, insert_from, merge, repair_table,
    split_partitions, upsert_clauses, MergeClause, EXTERNAL_COMPRESSION, VERSIONED_COMPRESSION,
};
use crate::convert::{
    engine_to_ddl, infer_arrow_schema, quote_string, to_versioned_columns, ColumnType,
};
use crate::engine::{parquet_source, quote_ident};
use crate::error::{AthenaError, Result};
use crate::query::ExecutionClient;
use crate::reader::EngineReader;
use crate::result::{write_parquet_file, ColumnarTable};
use crate::storage::S3Location;

/// Data to write.
#[derive(Debug, Clone)]
pub enum WriteSource {
    Arrow(ColumnarTable),
    /// Parquet files, local paths or `s3://` URIs.
    Parquet(Vec<String>),
}

impl WriteSource {
    fn ensure_not_empty(&self) -> Result<()> {
        match self {
            Self::Arrow(table) if table.is_empty() => {
                Err(AthenaError::programming("Cannot write an empty table"))
            }
            Self::Parquet(files) if files.is_empty() => {
                Err(AthenaError::programming("No parquet files to write"))
            }
            _ => Ok(()),
        }
    }

    /// A query over the source. Arrow tables are first staged as parquet in
    /// `scratch`.
    fn query(&self, scratch: &Path) -> Result<String> {
        let files = match self {
            Self::Arrow(table) => {
                let path = scratch.join("source.parquet");
                write_parquet_file(table, &path)?;
                vec![path.to_string_lossy().to_string()]
            }
            Self::Parquet(files) => files.clone(),
        };
        Ok(format!("SELECT * FROM {}", parquet_source(&files)))
    }
}

/// Where and how a table is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub table: String,
    /// Defaults to the session schema.
    pub schema: Option<String>,
    /// Defaults to the session catalog.
    pub catalog: Option<String>,
    /// Prefix under which table data is written; defaults to the staging
    /// directory.
    pub location: Option<String>,
    /// Partition columns, or transforms for versioned tables.
    pub partitions: Vec<String>,
    /// Parquet codec; defaults to GZIP for external and snappy for
    /// versioned tables.
    pub compression: Option<String>,
}

impl WriteOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn in_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn partitioned_by<I, S>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partitions = partitions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }
}

/// What to do when the versioned table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IfExists {
    /// Drop the table and its data, then create it again.
    #[default]
    Replace,
    /// Insert into the existing table.
    Append,
}

/// How staged rows are merged into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSpec {
    /// Match condition, written with the aliases.
    pub predicate: String,
    /// (target alias, source alias)
    pub aliases: (String, String),
    pub clauses: Vec<MergeClause>,
}

impl MergeSpec {
    /// Upsert on `predicate` with aliases `t` and `s`.
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            aliases: ("t".to_string(), "s".to_string()),
            clauses: upsert_clauses(),
        }
    }

    pub fn with_aliases(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.aliases = (target.into(), source.into());
        self
    }

    pub fn with_clauses(mut self, clauses: Vec<MergeClause>) -> Self {
        self.clauses = clauses;
        self
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStep {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Record of a multi-step write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub table: String,
    /// Columns of the written data.
    pub columns: Vec<ColumnType>,
    pub steps: Vec<WriteStep>,
}

impl WriteReport {
    /// Returns true if no step failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &WriteStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    /// Outcome of the named step, if it was part of the sequence.
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == step).map(|s| &s.outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    /// Later steps depend on it.
    Required,
    /// Failure is recorded and the sequence continues.
    BestEffort,
    /// Runs even after a required step failed.
    Cleanup,
}

struct Sequence {
    report: WriteReport,
    halted_by: Option<String>,
}

impl Sequence {
    fn new(table: &str, columns: Vec<ColumnType>) -> Self {
        Self {
            report: WriteReport {
                table: table.to_string(),
                columns,
                steps: Vec::new(),
            },
            halted_by: None,
        }
    }

    async fn run<T, F>(&mut self, name: &str, kind: StepKind, step: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        if kind != StepKind::Cleanup {
            if let Some(failed) = &self.halted_by {
                let reason = format!("{failed} failed");
                self.record(name, StepOutcome::Skipped(reason));
                return None;
            }
        }

        match step.await {
            Ok(value) => {
                debug!(table = %self.report.table, step = name, "Write step done");
                self.record(name, StepOutcome::Done);
                Some(value)
            }
            Err(e) => {
                warn!(table = %self.report.table, step = name, error = %e, "Write step failed");
                self.record(name, StepOutcome::Failed(e.to_string()));
                if kind == StepKind::Required {
                    self.halted_by = Some(name.to_string());
                }
                None
            }
        }
    }

    fn record(&mut self, name: &str, outcome: StepOutcome) {
        self.report.steps.push(WriteStep {
            name: name.to_string(),
            outcome,
        });
    }

    fn finish(self) -> WriteReport {
        info!(
            table = %self.report.table,
            steps = self.report.steps.len(),
            success = self.report.is_success(),
            "Write finished"
        );
        self.report
    }
}

struct Target {
    schema: String,
    catalog: String,
    /// Ends with `/`.
    location: String,
}

impl Target {
    fn fresh_dir(&self) -> String {
        format!("{}{}/", self.location, Uuid::new_v4())
    }
}

/// Writes local data as warehouse tables.
#[derive(Debug, Clone)]
pub struct TableWriter {
    engine: EngineReader,
}

impl TableWriter {
    pub fn new(engine: EngineReader) -> Self {
        Self { engine }
    }

    fn client(&self) -> &ExecutionClient {
        self.engine.client()
    }

    fn resolve(&self, options: &WriteOptions) -> Result<Target> {
        let session = self.client().session();
        let schema = match &options.schema {
            Some(schema) => schema.clone(),
            None => session.require_schema("write")?.to_string(),
        };
        let catalog = options
            .catalog
            .clone()
            .unwrap_or_else(|| session.catalog.clone());
        let mut location = options
            .location
            .clone()
            .unwrap_or_else(|| self.client().staging_dir().to_string());
        if !location.ends_with('/') {
            location.push('/');
        }
        Ok(Target {
            schema,
            catalog,
            location,
        })
    }

    /// Drops `table` and deletes its data when it exists.
    ///
    /// Returns false when the catalog has no such table.
    pub async fn delete_table(&self, table: &str, schema: Option<&str>) -> Result<bool> {
        let target = self.resolve(&WriteOptions {
            schema: schema.map(String::from),
            ..WriteOptions::new(table)
        })?;
        self.drop_existing(&target, table).await
    }

    async fn drop_existing(&self, target: &Target, table: &str) -> Result<bool> {
        let metadata = self
            .client()
            .service()
            .get_table_metadata(&target.catalog, &target.schema, table)
            .await?;
        let Some(metadata) = metadata else {
            debug!(schema = %target.schema, table, "Table does not exist; nothing to drop");
            return Ok(false);
        };

        self.client()
            .submit(&drop_table(&target.schema, table), false)
            .await?;

        if let Some(location) = metadata.location() {
            let prefix = S3Location::parse(location)?;
            let deleted = self.engine.storage().delete_prefix(&prefix).await?;
            info!(table, %prefix, deleted, "Deleted table data");
        }
        Ok(true)
    }

    async fn columns_of(&self, source: &WriteSource) -> Result<Vec<ColumnType>> {
        match source {
            WriteSource::Arrow(table) => infer_arrow_schema(table.schema()),
            WriteSource::Parquet(_) => {
                let source = source.clone();
                let described = self
                    .engine
                    .with_engine(None, move |engine| {
                        let scratch = tempfile::tempdir()?;
                        engine.describe(&source.query(scratch.path())?)
                    })
                    .await?;
                described
                    .into_iter()
                    .map(|(name, engine_type)| {
                        engine_to_ddl(&engine_type)
                            .map(|ddl| ColumnType::new(name.clone(), ddl))
                            .map_err(|e| match e {
                                AthenaError::Value(msg) => {
                                    AthenaError::value(format!("Column '{name}': {msg}"))
                                }
                                other => other,
                            })
                    })
                    .collect()
            }
        }
    }

    /// Writes the source's rows as parquet under `dir`.
    async fn export_files(
        &self,
        source: &WriteSource,
        dir: &str,
        partition_columns: &[String],
        compression: &str,
    ) -> Result<()> {
        let mut options = format!(
            "FORMAT PARQUET, COMPRESSION {}",
            quote_string(&compression.to_lowercase())
        );
        if !dir.starts_with("s3://") {
            // Local targets must exist before the engine writes into them.
            std::fs::create_dir_all(dir)?;
        }
        let target = if partition_columns.is_empty() {
            format!("{dir}{}.parquet.gzip", Uuid::new_v4())
        } else {
            let quoted: Vec<String> = partition_columns.iter().map(|c| quote_ident(c)).collect();
            options.push_str(&format!(
                ", PARTITION_BY ({}), FILE_EXTENSION 'parquet.gz'",
                quoted.join(", ")
            ));
            dir.to_string()
        };

        let source = source.clone();
        self.engine
            .with_engine(None, move |engine| {
                let scratch = tempfile::tempdir()?;
                engine.copy_to(&source.query(scratch.path())?, &target, &options)
            })
            .await
    }

    async fn submit(&self, statement: String) -> Result<()> {
        self.client().submit(&statement, false).await.map(|_| ())
    }

    /// Writes an Arrow table as an external table, replacing any existing
    /// table of that name.
    pub async fn write_arrow(&self, table: &ColumnarTable, options: &WriteOptions) -> Result<WriteReport> {
        self.write_external(WriteSource::Arrow(table.clone()), options)
            .await
    }

    /// Writes parquet files as an external table, replacing any existing
    /// table of that name.
    pub async fn write_parquet(&self, files: &[String], options: &WriteOptions) -> Result<WriteReport> {
        self.write_external(WriteSource::Parquet(files.to_vec()), options)
            .await
    }

    async fn write_external(&self, source: WriteSource, options: &WriteOptions) -> Result<WriteReport> {
        source.ensure_not_empty()?;
        let target = self.resolve(options)?;
        let columns = self.columns_of(&source).await?;
        let compression = options
            .compression
            .clone()
            .unwrap_or_else(|| EXTERNAL_COMPRESSION.to_string());

        let (_, keys) = split_partitions(&columns, &options.partitions)?;
        let keys: Vec<String> = keys.into_iter().map(|c| c.name.clone()).collect();
        let dir = target.fresh_dir();
        let ddl = create_external_table(
            &target.schema,
            &options.table,
            &columns,
            &options.partitions,
            &dir,
            &compression,
        )?;

        let table = options.table.as_str();
        let mut seq = Sequence::new(table, columns);
        seq.run("drop table", StepKind::BestEffort, self.drop_existing(&target, table))
            .await;
        seq.run(
            "export files",
            StepKind::Required,
            self.export_files(&source, &dir, &keys, &compression),
        )
        .await;
        seq.run("create table", StepKind::Required, self.submit(ddl))
            .await;
        if !keys.is_empty() {
            seq.run(
                "repair partitions",
                StepKind::BestEffort,
                self.submit(repair_table(&target.schema, table)),
            )
            .await;
        }
        Ok(seq.finish())
    }

    /// Stages the source as `temp_<table>`, an external table, recording the
    /// steps in `seq`.
    async fn stage(
        &self,
        seq: &mut Sequence,
        target: &Target,
        staging: &str,
        source: &WriteSource,
        columns: &[ColumnType],
    ) -> Result<()> {
        let dir = target.fresh_dir();
        let ddl = create_external_table(
            &target.schema,
            staging,
            columns,
            &[],
            &dir,
            EXTERNAL_COMPRESSION,
        )?;

        seq.run(
            "drop stale staging table",
            StepKind::BestEffort,
            self.drop_existing(target, staging),
        )
        .await;
        seq.run(
            "export staging files",
            StepKind::Required,
            self.export_files(source, &dir, &[], EXTERNAL_COMPRESSION),
        )
        .await;
        seq.run("create staging table", StepKind::Required, self.submit(ddl))
            .await;
        Ok(())
    }

    /// Writes the source into a versioned table through a staging table.
    ///
    /// With `IfExists::Replace` the table is dropped and created again before
    /// the insert; with `IfExists::Append` rows are inserted into the
    /// existing table. The staging table is dropped on every path.
    pub async fn write_table_iceberg(
        &self,
        source: WriteSource,
        options: &WriteOptions,
        if_exists: IfExists,
    ) -> Result<WriteReport> {
        source.ensure_not_empty()?;
        let target = self.resolve(options)?;
        let columns = self.columns_of(&source).await?;
        let table = options.table.as_str();
        let staging = format!("temp_{table}");
        let compression = options
            .compression
            .clone()
            .unwrap_or_else(|| VERSIONED_COMPRESSION.to_string());
        let ddl = create_versioned_table(
            &target.schema,
            table,
            &to_versioned_columns(&columns),
            &options.partitions,
            &target.fresh_dir(),
            &compression,
        );

        let mut seq = Sequence::new(table, columns.clone());
        self.stage(&mut seq, &target, &staging, &source, &columns)
            .await?;
        if if_exists == IfExists::Replace {
            seq.run("drop table", StepKind::BestEffort, self.drop_existing(&target, table))
                .await;
            seq.run("create table", StepKind::Required, self.submit(ddl))
                .await;
        }
        seq.run(
            "insert",
            StepKind::Required,
            self.submit(insert_from(&target.schema, table, &staging)),
        )
        .await;
        seq.run(
            "drop staging table",
            StepKind::Cleanup,
            self.drop_existing(&target, &staging),
        )
        .await;
        Ok(seq.finish())
    }

    /// Merges the source into an existing versioned table.
    ///
    /// Update and insert clauses use the source's columns.
    pub async fn merge_table_iceberg(
        &self,
        source: WriteSource,
        options: &WriteOptions,
        spec: &MergeSpec,
    ) -> Result<WriteReport> {
        source.ensure_not_empty()?;
        let target = self.resolve(options)?;
        let columns = self.columns_of(&source).await?;
        let table = options.table.as_str();
        let staging = format!("temp_{table}");
        let statement = merge(
            &target.schema,
            table,
            &staging,
            (&spec.aliases.0, &spec.aliases.1),
            &spec.predicate,
            &columns,
            &spec.clauses,
        )?;

        let mut seq = Sequence::new(table, columns.clone());
        self.stage(&mut seq, &target, &staging, &source, &columns)
            .await?;
        seq.run("merge", StepKind::Required, self.submit(statement))
            .await;
        seq.run(
            "drop staging table",
            StepKind::Cleanup,
            self.drop_existing(&target, &staging),
        )
        .await;
        Ok(seq.finish())
    }
}
