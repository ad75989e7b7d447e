//! Embedded-engine reader integration tests.
//!
//! Exported files are local parquet files listed in an in-memory manifest,
//! so the engine reads them without network access.

use std::path::Path;
use std::sync::Arc;

use athena_cursor::config::EngineConfig;
use athena_cursor::convert::Value;
use athena_cursor::engine::Engine;
use athena_cursor::result::write_parquet_file;
use athena_cursor::service::{MockExecution, MockQueryService};
use athena_cursor::storage::ObjectStorage;

use super::common::{engine_cursor, put_manifest, sales};

/// Writes one parquet file per part and scripts `times` exports listing them.
async fn script_export(
    mock: &MockQueryService,
    storage: &ObjectStorage,
    dir: &Path,
    parts: &[&[i64]],
    times: usize,
) -> Vec<String> {
    let mut files = Vec::new();
    for (i, ids) in parts.iter().enumerate() {
        let path = dir.join(format!("export-{i}.parquet"));
        let regions: Vec<&str> = ids.iter().map(|_| "eu").collect();
        write_parquet_file(&sales(ids, &regions), &path).unwrap();
        files.push(path.to_string_lossy().to_string());
    }
    let manifest = put_manifest(storage, "engine", &files).await;
    for _ in 0..times {
        mock.push_execution(MockExecution::succeeded().with_manifest(manifest.clone()));
    }
    files
}

fn count(database: &Path, table: &str) -> i64 {
    let engine = Engine::open(Some(database), &EngineConfig::local(), None).unwrap();
    let table = engine
        .query_table(&format!("SELECT count(*) AS c FROM \"{table}\""))
        .unwrap();
    match &table.rows().unwrap()[0][0] {
        Value::Int(n) => *n,
        other => panic!("unexpected count {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    script_export(&mock, &storage, dir.path(), &[&[1, 2], &[3]], 1).await;

    let mut cursor = engine_cursor(&mock, &storage, dir.path());
    cursor.execute("SELECT * FROM sales", None).await.unwrap();

    assert_eq!(cursor.rowcount(), 3);
    let mut ids: Vec<Value> = cursor
        .fetchall()
        .await
        .unwrap()
        .into_iter()
        .map(|row| row[0].clone())
        .collect();
    ids.sort_by_key(|v| v.to_string());
    assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[tokio::test]
async fn test_create_then_insert_local_table() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("local.duckdb");
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    script_export(&mock, &storage, dir.path(), &[&[1, 2]], 3).await;

    let mut cursor = engine_cursor(&mock, &storage, dir.path());
    cursor.execute("SELECT * FROM sales", None).await.unwrap();
    cursor.to_create_table_db("sales", None).await.unwrap();
    assert_eq!(count(&database, "sales"), 2);

    cursor.to_insert_table_db("sales", None).await.unwrap();
    assert_eq!(count(&database, "sales"), 4);
}

#[tokio::test]
async fn test_insert_into_missing_table_fails_before_submitting() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    script_export(&mock, &storage, dir.path(), &[&[1]], 1).await;

    let mut cursor = engine_cursor(&mock, &storage, dir.path());
    cursor.execute("SELECT * FROM sales", None).await.unwrap();

    let missing_db = dir.path().join("nowhere.duckdb");
    let err = cursor
        .to_insert_table_db("sales", Some(&missing_db))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Programming Error");
    assert_eq!(mock.queries().len(), 1);
}

#[tokio::test]
async fn test_partitioned_load_reports_each_file() {
    let dir = tempfile::tempdir().unwrap();
    let database = dir.path().join("local.duckdb");
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    let files = script_export(&mock, &storage, dir.path(), &[&[1], &[2, 3], &[4], &[5, 6, 7]], 2).await;

    let mut cursor = engine_cursor(&mock, &storage, dir.path());
    cursor.execute("SELECT * FROM sales", None).await.unwrap();
    let report = cursor
        .to_partition_create_table_db("sales", None, Some(2))
        .await
        .unwrap();

    assert!(report.is_complete(), "{report:?}");
    assert_eq!(report.loaded.len(), files.len());
    assert_eq!(report.loaded[0], files[0]);
    assert_eq!(count(&database, "sales"), 7);
}
