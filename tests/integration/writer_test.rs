//! Warehouse write integration tests.
//!
//! Table data goes to a local directory standing in for the table location;
//! the DDL is captured by the mock service.

use std::collections::HashMap;
use std::sync::Arc;

use athena_cursor::ddl::{
    IfExists, MergeAction, MergeClause, MergeSpec, StepOutcome, WriteOptions, WriteSource,
};
use athena_cursor::result::ColumnarTable;
use athena_cursor::service::{MockExecution, MockQueryService, TableMetadata};
use athena_cursor::storage::{ObjectStorage, S3Location};
use bytes::Bytes;

use super::common::{columnar_cursor, engine_cursor, sales};

fn options(dir: &std::path::Path, table: &str) -> WriteOptions {
    WriteOptions::new(table).at_location(format!("{}/warehouse/", dir.display()))
}

#[tokio::test]
async fn test_writes_need_the_engine_reader() {
    let mock = Arc::new(MockQueryService::new());
    let cursor = columnar_cursor(&mock, &ObjectStorage::in_memory());

    let err = cursor
        .write_arrow(&sales(&[1], &["eu"]), &WriteOptions::new("t"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Programming error: write is not supported by the columnar reader"
    );
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_replace_existing_external_table() {
    let dir = tempfile::tempdir().unwrap();
    let storage = ObjectStorage::in_memory();
    storage
        .put_object(&S3Location::new("bucket", "warehouse/sales/old.parquet"), Bytes::from_static(b"x"))
        .await
        .unwrap();
    let mock = Arc::new(MockQueryService::new());
    mock.add_table(
        "awsdatacatalog",
        "analytics",
        TableMetadata {
            name: "sales".to_string(),
            table_type: Some("EXTERNAL_TABLE".to_string()),
            parameters: HashMap::from([(
                "location".to_string(),
                "s3://bucket/warehouse/sales/".to_string(),
            )]),
            ..Default::default()
        },
    );
    let cursor = engine_cursor(&mock, &storage, dir.path());

    let report = cursor
        .write_arrow(
            &sales(&[1, 2, 3], &["eu", "us", "eu"]),
            &options(dir.path(), "sales").partitioned_by(["region"]),
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    let queries = mock.queries();
    assert_eq!(queries[0], "DROP TABLE `analytics`.`sales`");
    assert!(queries[1].starts_with("CREATE EXTERNAL TABLE `analytics`.`sales` (\n`id` BIGINT\n)\nPARTITIONED BY (\n`region` STRING\n)"));
    assert!(queries[1].contains("STORED AS PARQUET"));
    assert_eq!(queries[2], "MSCK REPAIR TABLE `analytics`.`sales`");

    let old = storage
        .list_prefix(&S3Location::new("bucket", "warehouse/sales/"))
        .await
        .unwrap();
    assert!(old.is_empty());
}

#[tokio::test]
async fn test_transform_partition_on_external_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());

    let err = cursor
        .write_arrow(
            &sales(&[1], &["eu"]),
            &options(dir.path(), "sales").partitioned_by(["bucket(4, id)"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Value Error");
    assert!(mock.queries().is_empty());
}

#[tokio::test]
async fn test_versioned_append_inserts_from_staging() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());

    let report = cursor
        .write_table_iceberg(
            WriteSource::Arrow(sales(&[1, 2], &["eu", "us"])),
            &options(dir.path(), "events").in_schema("lake"),
            IfExists::Append,
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    let queries = mock.queries();
    assert!(queries[0].starts_with("CREATE EXTERNAL TABLE `lake`.`temp_events`"));
    assert_eq!(
        queries[1],
        "INSERT INTO \"lake\".\"events\" SELECT * FROM \"lake\".\"temp_events\""
    );
}

#[tokio::test]
async fn test_merge_with_conditional_delete() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());
    let spec = MergeSpec::new("tgt.id = src.id")
        .with_aliases("tgt", "src")
        .with_clauses(vec![
            MergeClause::new(MergeAction::Delete).when("src.region = 'gone'"),
            MergeClause::new(MergeAction::Insert),
        ]);

    let report = cursor
        .merge_table_iceberg(
            WriteSource::Arrow(sales(&[1], &["gone"])),
            &options(dir.path(), "events"),
            &spec,
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    assert_eq!(
        mock.queries()[1],
        "MERGE INTO \"analytics\".\"events\" AS tgt\n\
         USING \"analytics\".\"temp_events\" AS src\n\
         ON (tgt.id = src.id)\n\
         WHEN MATCHED AND src.region = 'gone' THEN DELETE\n\
         WHEN NOT MATCHED THEN INSERT (\"id\", \"region\") VALUES (src.\"id\", src.\"region\")"
    );
}

#[tokio::test]
async fn test_failed_create_skips_insert_but_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    // staging create succeeds, table create fails
    mock.push_execution(MockExecution::succeeded());
    mock.push_execution(MockExecution::failed(None).with_reason("Table already exists"));
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());

    let report = cursor
        .write_table_iceberg(
            WriteSource::Arrow(sales(&[1], &["eu"])),
            &options(dir.path(), "events"),
            IfExists::Replace,
        )
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(
        report.outcome("insert"),
        Some(&StepOutcome::Skipped("create table failed".to_string()))
    );
    assert_eq!(report.outcome("drop staging table"), Some(&StepOutcome::Done));
    assert_eq!(mock.queries().len(), 2);
}

#[tokio::test]
async fn test_empty_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());

    let err = cursor
        .write_table_iceberg(
            WriteSource::Parquet(Vec::new()),
            &options(dir.path(), "events"),
            IfExists::Replace,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Programming error: No parquet files to write");

    let err = cursor
        .write_arrow(&ColumnarTable::empty(), &options(dir.path(), "t"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Programming Error");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_delete_missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockQueryService::new());
    let cursor = engine_cursor(&mock, &ObjectStorage::in_memory(), dir.path());

    assert!(!cursor.delete_table("nothing", None).await.unwrap());
    assert!(mock.queries().is_empty());
}
