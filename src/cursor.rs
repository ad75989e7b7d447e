//! The unified cursor.
//!
//! A `Cursor` owns one reader variant and dispatches `execute`, `fetch*`,
//! `to_*` and `write_*` to it. Operations the variant does not offer fail
//! with a programming error before anything is sent to the service.
//!
//! `to_*` and `write`-side conversions re-run the last executed statement
//! through the reader, so each one is an independent execution.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::aws::{load_sdk_config, resolve_credentials};
use crate::classify::is_mutating;
use crate::config::Config;
use crate::convert::{format_query, Parameters, Row};
use crate::ddl::{IfExists, MergeSpec, TableWriter, WriteOptions, WriteReport, WriteSource};
use crate::error::{AthenaError, Result};
use crate::query::{ExecutionClient, ExecutionHandle};
use crate::reader::{
    BulkLoadReport, Capability, ColumnarReader, EngineReader, PaginatedReader, Reader, ReaderKind,
    RowStream,
};
use crate::result::{ColumnDescriptor, ColumnarTable, Frame, CSV_DELIMITER};
use crate::service::AthenaService;
use crate::storage::{ObjectStorage, S3StorageFactory};

/// Outcome of `Cursor::execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum Executed {
    /// A mutating statement; carries its status row when the service
    /// returned one.
    Status(Option<Row>),
    /// A result set is ready to be fetched.
    ResultSet,
}

#[derive(Debug)]
enum State {
    Idle,
    /// Paginated rows, pulled lazily.
    Stream(RowStream),
    /// Rows of a materialized table.
    Buffered {
        handle: ExecutionHandle,
        descriptors: Vec<ColumnDescriptor>,
        rows: VecDeque<Row>,
        total: usize,
    },
    /// A mutating statement whose status row was already consumed.
    Done {
        handle: ExecutionHandle,
        descriptors: Vec<ColumnDescriptor>,
        update_count: Option<i64>,
    },
}

/// Executes statements and materializes their results.
#[derive(Debug)]
pub struct Cursor {
    reader: Reader,
    state: State,
    query: Option<String>,
}

impl Cursor {
    pub fn new(reader: Reader) -> Self {
        Self {
            reader,
            state: State::Idle,
            query: None,
        }
    }

    /// Builds a cursor over the remote service from configuration.
    ///
    /// Credentials left unset in `config` come from the SDK provider chain
    /// and are shared with object storage and the embedded engine.
    pub async fn connect(config: &Config, kind: ReaderKind) -> Result<Self> {
        config.validate()?;
        let sdk = load_sdk_config(&config.aws).await;
        let credentials = resolve_credentials(&sdk).await?;
        let service = Arc::new(AthenaService::from_sdk_config(&sdk));
        let client = ExecutionClient::new(service, config.session.clone())?;

        let mut factory = S3StorageFactory::new(credentials.clone());
        if let Some(region) = sdk.region() {
            factory = factory.with_region(region.to_string());
        }
        if let Some(endpoint) = &config.aws.endpoint_url {
            factory = factory.with_endpoint(endpoint.clone());
        }
        let storage = ObjectStorage::new(Arc::new(factory));

        let reader = match kind {
            ReaderKind::Rows => Reader::Rows(PaginatedReader::new(client)),
            ReaderKind::Columnar => Reader::Columnar(ColumnarReader::new(client, storage)),
            ReaderKind::Engine => Reader::Engine(EngineReader::new(
                client,
                storage,
                config.engine.clone(),
                credentials,
            )),
        };
        info!(reader = %kind, "Cursor connected");
        Ok(Self::new(reader))
    }

    pub fn kind(&self) -> ReaderKind {
        self.reader.kind()
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    fn client(&self) -> &ExecutionClient {
        self.reader.client()
    }

    fn reuse(&self) -> bool {
        self.client().session().result_reuse
    }

    /// The last executed statement, after parameter substitution.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn last_query(&self, capability: Capability) -> Result<String> {
        self.kind().require(capability)?;
        self.query.clone().ok_or_else(|| {
            AthenaError::programming(format!(
                "{} called before execute",
                capability.operation()
            ))
        })
    }

    /// Runs `statement`, substituting `params` first when given.
    ///
    /// Mutating statements are submitted unchanged on every reader and
    /// their status row is consumed here. Other statements leave their rows
    /// for the `fetch*` calls.
    pub async fn execute(&mut self, statement: &str, params: Option<&Parameters>) -> Result<Executed> {
        let query = format_query(statement, params)?;
        self.state = State::Idle;
        self.query = Some(query.clone());
        let reuse = self.reuse();

        if is_mutating(&query) {
            let mut stream = PaginatedReader::new(self.client().clone())
                .execute(&query, reuse)
                .await?;
            let status = stream.next_row().await?;
            debug!(execution_id = %stream.handle().execution_id, "Mutating statement finished");
            self.state = State::Done {
                handle: stream.handle().clone(),
                descriptors: stream.descriptors().to_vec(),
                update_count: stream.update_count(),
            };
            return Ok(Executed::Status(status));
        }

        self.state = match &self.reader {
            Reader::Rows(reader) => State::Stream(reader.execute(&query, reuse).await?),
            Reader::Columnar(reader) => buffered(reader.read(&query, reuse).await?)?,
            Reader::Engine(reader) => buffered(reader.read(&query, reuse).await?)?,
        };
        Ok(Executed::ResultSet)
    }

    /// Handle of the last execution.
    pub fn handle(&self) -> Option<&ExecutionHandle> {
        match &self.state {
            State::Idle => None,
            State::Stream(stream) => Some(stream.handle()),
            State::Buffered { handle, .. } | State::Done { handle, .. } => Some(handle),
        }
    }

    /// Column descriptors of the last result; `None` before any execution.
    pub fn description(&self) -> Option<&[ColumnDescriptor]> {
        match &self.state {
            State::Idle => None,
            State::Stream(stream) => Some(stream.descriptors()),
            State::Buffered { descriptors, .. } | State::Done { descriptors, .. } => {
                Some(descriptors)
            }
        }
    }

    /// Rows in the last result, or rows affected by the last mutation.
    /// `-1` when unknown.
    pub fn rowcount(&self) -> i64 {
        match &self.state {
            State::Buffered { total, .. } => i64::try_from(*total).unwrap_or(i64::MAX),
            State::Done { update_count, .. } => update_count.unwrap_or(-1),
            State::Idle | State::Stream(_) => -1,
        }
    }

    fn ensure_executed(&self) -> Result<()> {
        self.kind().require(Capability::Fetch)?;
        if matches!(self.state, State::Idle) {
            return Err(AthenaError::programming("fetch called before execute"));
        }
        Ok(())
    }

    /// Next row, or `None` once the result is exhausted.
    pub async fn fetchone(&mut self) -> Result<Option<Row>> {
        self.ensure_executed()?;
        match &mut self.state {
            State::Stream(stream) => stream.next_row().await,
            State::Buffered { rows, .. } => Ok(rows.pop_front()),
            State::Done { .. } | State::Idle => Ok(None),
        }
    }

    /// Up to `size` rows; fewer only when the result is exhausted.
    pub async fn fetchmany(&mut self, size: usize) -> Result<Vec<Row>> {
        self.ensure_executed()?;
        match &mut self.state {
            State::Stream(stream) => stream.next_rows(size).await,
            State::Buffered { rows, .. } => {
                let n = size.min(rows.len());
                Ok(rows.drain(..n).collect())
            }
            State::Done { .. } | State::Idle => Ok(Vec::new()),
        }
    }

    /// Every remaining row.
    pub async fn fetchall(&mut self) -> Result<Vec<Row>> {
        self.ensure_executed()?;
        match &mut self.state {
            State::Stream(stream) => stream.remaining().await,
            State::Buffered { rows, .. } => Ok(rows.drain(..).collect()),
            State::Done { .. } | State::Idle => Ok(Vec::new()),
        }
    }

    /// Remaining rows of the last result as a frame.
    ///
    /// The rows reader drains its open stream; the export readers read the
    /// last statement again.
    pub async fn to_frame(&mut self) -> Result<Frame> {
        self.kind().require(Capability::Frame)?;
        if !matches!(self.reader, Reader::Rows(_)) {
            return self.to_arrow().await?.to_frame();
        }
        match &mut self.state {
            State::Stream(stream) => {
                let columns = stream.column_names();
                let rows = stream.remaining().await?;
                Ok(Frame::new(columns, rows))
            }
            State::Done { descriptors, .. } | State::Buffered { descriptors, .. } => {
                let columns = descriptors.iter().map(|d| d.name.clone()).collect();
                Ok(Frame::new(columns, Vec::new()))
            }
            State::Idle => Err(AthenaError::programming("to_frame called before execute")),
        }
    }

    /// Reads the last statement into an Arrow table.
    pub async fn to_arrow(&self) -> Result<ColumnarTable> {
        let query = self.last_query(Capability::Arrow)?;
        let reuse = self.reuse();
        let (_, table) = match &self.reader {
            Reader::Columnar(reader) => reader.read(&query, reuse).await?,
            Reader::Engine(reader) => reader.read(&query, reuse).await?,
            Reader::Rows(_) => return Err(unsupported(Capability::Arrow)),
        };
        Ok(table)
    }

    /// Writes the last statement's result to a parquet file.
    pub async fn to_parquet(&self, path: &Path) -> Result<()> {
        let query = self.last_query(Capability::Parquet)?;
        let reuse = self.reuse();
        match &self.reader {
            Reader::Columnar(reader) => reader.to_parquet(&query, reuse, path).await.map(|_| ()),
            Reader::Engine(reader) => reader.to_parquet(&query, reuse, path).await,
            Reader::Rows(_) => Err(unsupported(Capability::Parquet)),
        }
    }

    /// Writes the last statement's result as delimited text.
    ///
    /// `delimiter` defaults to `;`.
    pub async fn to_csv(&self, path: &Path, delimiter: Option<u8>, header: bool) -> Result<()> {
        let query = self.last_query(Capability::Csv)?;
        let reuse = self.reuse();
        let delimiter = delimiter.unwrap_or(CSV_DELIMITER);
        match &self.reader {
            Reader::Columnar(reader) => reader
                .to_csv(&query, reuse, path, delimiter, header)
                .await
                .map(|_| ()),
            Reader::Engine(reader) => reader.to_csv(&query, reuse, path, delimiter, header).await,
            Reader::Rows(_) => Err(unsupported(Capability::Csv)),
        }
    }

    fn engine(&self, capability: Capability) -> Result<&EngineReader> {
        self.kind().require(capability)?;
        match &self.reader {
            Reader::Engine(reader) => Ok(reader),
            _ => Err(unsupported(capability)),
        }
    }

    /// Replaces `table` in the local database with the last statement's
    /// result.
    pub async fn to_create_table_db(&self, table: &str, database: Option<&Path>) -> Result<()> {
        let engine = self.engine(Capability::CreateTableDb)?;
        let query = self.last_query(Capability::CreateTableDb)?;
        engine
            .to_create_table_db(&query, self.reuse(), table, database)
            .await
    }

    /// Like `to_create_table_db`, loading the exported files in parallel.
    pub async fn to_partition_create_table_db(
        &self,
        table: &str,
        database: Option<&Path>,
        workers: Option<usize>,
    ) -> Result<BulkLoadReport> {
        let engine = self.engine(Capability::PartitionCreateTableDb)?;
        let query = self.last_query(Capability::PartitionCreateTableDb)?;
        engine
            .to_partition_create_table_db(&query, self.reuse(), table, database, workers)
            .await
    }

    /// Appends the last statement's result to an existing local table.
    pub async fn to_insert_table_db(&self, table: &str, database: Option<&Path>) -> Result<()> {
        let engine = self.engine(Capability::InsertTableDb)?;
        let query = self.last_query(Capability::InsertTableDb)?;
        engine
            .to_insert_table_db(&query, self.reuse(), table, database)
            .await
    }

    fn writer(&self) -> Result<TableWriter> {
        Ok(TableWriter::new(self.engine(Capability::WriteTable)?.clone()))
    }

    /// Writes an Arrow table as an external table.
    pub async fn write_arrow(&self, table: &ColumnarTable, options: &WriteOptions) -> Result<WriteReport> {
        self.writer()?.write_arrow(table, options).await
    }

    /// Writes parquet files as an external table.
    pub async fn write_parquet(&self, files: &[String], options: &WriteOptions) -> Result<WriteReport> {
        self.writer()?.write_parquet(files, options).await
    }

    /// Writes into a versioned table.
    pub async fn write_table_iceberg(
        &self,
        source: WriteSource,
        options: &WriteOptions,
        if_exists: IfExists,
    ) -> Result<WriteReport> {
        self.writer()?
            .write_table_iceberg(source, options, if_exists)
            .await
    }

    /// Merges into an existing versioned table.
    pub async fn merge_table_iceberg(
        &self,
        source: WriteSource,
        options: &WriteOptions,
        spec: &MergeSpec,
    ) -> Result<WriteReport> {
        self.writer()?
            .merge_table_iceberg(source, options, spec)
            .await
    }

    /// Drops a warehouse table and deletes its data.
    pub async fn delete_table(&self, table: &str, schema: Option<&str>) -> Result<bool> {
        self.writer()?.delete_table(table, schema).await
    }
}

fn unsupported(capability: Capability) -> AthenaError {
    AthenaError::programming(format!(
        "{} requires the engine reader",
        capability.operation()
    ))
}

fn buffered((handle, table): (ExecutionHandle, ColumnarTable)) -> Result<State> {
    let rows: VecDeque<Row> = table.rows()?.into();
    Ok(State::Buffered {
        handle,
        descriptors: table.descriptors(),
        total: rows.len(),
        rows,
    })
}
