//! Object-export reader integration tests.

use std::sync::Arc;

use athena_cursor::config::{ReadFailurePolicy, SessionConfig};
use athena_cursor::query::ExecutionClient;
use athena_cursor::reader::{unload_location, unload_statement, ColumnarReader};
use athena_cursor::result::read_parquet_file;
use athena_cursor::service::{MockExecution, MockQueryService};
use athena_cursor::storage::ObjectStorage;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::common::{client, columnar_cursor, parquet_bytes, put, put_manifest, sales, STAGING};

async fn exported(storage: &ObjectStorage) -> String {
    put(storage, "s3://bucket/out/a.parquet", parquet_bytes(&sales(&[1, 2], &["eu", "us"]))).await;
    put(storage, "s3://bucket/out/b.parquet", parquet_bytes(&sales(&[3], &["br"]))).await;
    put_manifest(
        storage,
        "export",
        &[
            "s3://bucket/out/a.parquet".to_string(),
            "s3://bucket/out/b.parquet".to_string(),
        ],
    )
    .await
}

#[test]
fn test_unload_statement_layout() {
    let now = Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap();
    let id = Uuid::nil();
    let location = unload_location(STAGING, now, id);

    assert_eq!(
        location,
        "s3://bucket/staging/unload/20240517/00000000-0000-0000-0000-000000000000/"
    );
    assert_eq!(
        unload_statement("SELECT 1", &location),
        format!(
            "UNLOAD (\n\tSELECT 1\n)\nTO '{location}'\nWITH (\n\tformat = 'PARQUET',\n\tcompression = 'ZSTD'\n)"
        )
    );
}

#[tokio::test]
async fn test_to_arrow_reruns_last_query() {
    let storage = ObjectStorage::in_memory();
    let manifest = exported(&storage).await;
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest.clone()));
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest));

    let mut cursor = columnar_cursor(&mock, &storage);
    cursor.execute("SELECT * FROM sales", None).await.unwrap();
    let table = cursor.to_arrow().await.unwrap();

    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.column_names(), vec!["id", "region"]);
    let queries = mock.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries.iter().all(|q| q.contains("SELECT * FROM sales")));
}

#[tokio::test]
async fn test_reader_used_directly() {
    let storage = ObjectStorage::in_memory();
    let manifest = exported(&storage).await;
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest));

    let reader = ColumnarReader::new(client(&mock), storage);
    let (handle, table) = reader.read("SELECT * FROM sales", false).await.unwrap();

    assert_eq!(handle.manifest_location(), Some("s3://bucket/staging/export-manifest.csv"));
    assert_eq!(table.batches().len(), 2);
}

#[tokio::test]
async fn test_cursor_writes_parquet_and_csv() {
    let storage = ObjectStorage::in_memory();
    let manifest = exported(&storage).await;
    let mock = Arc::new(MockQueryService::new());
    for _ in 0..3 {
        mock.push_execution(MockExecution::succeeded().with_manifest(manifest.clone()));
    }
    let dir = tempfile::tempdir().unwrap();

    let mut cursor = columnar_cursor(&mock, &storage);
    cursor.execute("SELECT * FROM sales", None).await.unwrap();

    let parquet = dir.path().join("sales.parquet");
    cursor.to_parquet(&parquet).await.unwrap();
    assert_eq!(read_parquet_file(&parquet).unwrap().num_rows(), 3);

    let csv = dir.path().join("sales.csv");
    cursor.to_csv(&csv, None, true).await.unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["id;region", "1;eu", "2;us", "3;br"]);

    // execute plus one export per conversion
    assert_eq!(mock.queries().len(), 3);
}

#[tokio::test]
async fn test_missing_export_can_yield_empty_table() {
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_manifest("s3://bucket/staging/gone-manifest.csv"));
    let session = SessionConfig {
        poll_interval_ms: 0,
        read_failure: ReadFailurePolicy::Empty,
        ..SessionConfig::with_staging_dir(STAGING)
    };
    let reader = ColumnarReader::new(ExecutionClient::new(mock.clone(), session).unwrap(), storage);

    let (_, table) = reader.read("SELECT 1", false).await.unwrap();
    assert!(table.is_empty());
}

#[tokio::test]
async fn test_missing_export_propagates_by_default() {
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded());
    let mut cursor = columnar_cursor(&mock, &storage);

    let err = cursor.execute("SELECT 1", None).await.unwrap_err();
    assert_eq!(err.to_string(), "Programming error: Data location does not exist");
}
