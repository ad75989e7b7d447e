//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use athena_cursor::config::{EngineConfig, SessionConfig};
use athena_cursor::query::ExecutionClient;
use athena_cursor::reader::{ColumnarReader, EngineReader, PaginatedReader, Reader};
use athena_cursor::result::{write_parquet_file, ColumnarTable};
use athena_cursor::service::{MockQueryService, ResultPage, ServiceColumn};
use athena_cursor::storage::{ObjectStorage, S3Location};
use athena_cursor::Cursor;

pub const STAGING: &str = "s3://bucket/staging/";

pub fn session() -> SessionConfig {
    SessionConfig {
        schema: Some("analytics".to_string()),
        poll_interval_ms: 0,
        ..SessionConfig::with_staging_dir(STAGING)
    }
}

pub fn client(mock: &Arc<MockQueryService>) -> ExecutionClient {
    ExecutionClient::new(mock.clone(), session()).unwrap()
}

pub fn rows_cursor(mock: &Arc<MockQueryService>) -> Cursor {
    Cursor::new(Reader::Rows(PaginatedReader::new(client(mock))))
}

pub fn columnar_cursor(mock: &Arc<MockQueryService>, storage: &ObjectStorage) -> Cursor {
    Cursor::new(Reader::Columnar(ColumnarReader::new(
        client(mock),
        storage.clone(),
    )))
}

/// An engine reader whose local database lives in `dir`.
pub fn engine_reader(mock: &Arc<MockQueryService>, storage: &ObjectStorage, dir: &Path) -> EngineReader {
    let config = EngineConfig {
        database: dir.join("local.duckdb"),
        ..EngineConfig::local()
    };
    EngineReader::new(client(mock), storage.clone(), config, None)
}

pub fn engine_cursor(mock: &Arc<MockQueryService>, storage: &ObjectStorage, dir: &Path) -> Cursor {
    Cursor::new(Reader::Engine(engine_reader(mock, storage, dir)))
}

pub fn column(name: &str, type_name: &str) -> ServiceColumn {
    ServiceColumn {
        name: name.to_string(),
        type_name: type_name.to_string(),
        ..Default::default()
    }
}

/// A results page. `header` repeats the column names as the first row, as
/// the service does on the first page of a query.
pub fn page(columns: &[ServiceColumn], rows: &[&[&str]], header: bool, next_token: Option<&str>) -> ResultPage {
    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    if header {
        cells.push(columns.iter().map(|c| Some(c.name.clone())).collect());
    }
    for row in rows {
        cells.push(row.iter().map(|v| Some(v.to_string())).collect());
    }
    ResultPage {
        columns: columns.to_vec(),
        rows: cells,
        next_token: next_token.map(String::from),
        update_count: None,
    }
}

/// A two-column (id BIGINT, region VARCHAR) table.
pub fn sales(ids: &[i64], regions: &[&str]) -> ColumnarTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("region", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids.to_vec())),
            Arc::new(StringArray::from(regions.to_vec())),
        ],
    )
    .unwrap();
    ColumnarTable::new(schema, vec![batch])
}

pub fn parquet_bytes(table: &ColumnarTable) -> Bytes {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part.parquet");
    write_parquet_file(table, &path).unwrap();
    Bytes::from(std::fs::read(path).unwrap())
}

pub async fn put(storage: &ObjectStorage, uri: &str, data: Bytes) {
    storage
        .put_object(&S3Location::parse(uri).unwrap(), data)
        .await
        .unwrap();
}

/// Writes a manifest listing `files` and returns its location.
pub async fn put_manifest(storage: &ObjectStorage, name: &str, files: &[String]) -> String {
    let uri = format!("{STAGING}{name}-manifest.csv");
    let body = files.iter().map(|f| format!("{f}\n")).collect::<String>();
    put(storage, &uri, Bytes::from(body)).await;
    uri
}
