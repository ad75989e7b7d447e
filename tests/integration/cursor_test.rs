//! Cursor integration tests.
//!
//! Covers the execute/fetch state machine and the capability guards across
//! reader variants.

use std::sync::Arc;

use athena_cursor::convert::{Parameters, Value};
use athena_cursor::reader::ReaderKind;
use athena_cursor::service::{MockExecution, MockQueryService, ResultPage};
use athena_cursor::storage::ObjectStorage;
use athena_cursor::Executed;

use super::common::{
    column, columnar_cursor, engine_cursor, page, parquet_bytes, put, put_manifest, rows_cursor,
    sales,
};

#[tokio::test]
async fn test_create_table_returns_status_row() {
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded()
            .with_statement_type("DDL")
            .with_page(page(&[column("rows", "bigint")], &[&["0"]], false, None)),
    );
    let mut cursor = rows_cursor(&mock);

    let executed = cursor
        .execute("CREATE TABLE t (id int)", None)
        .await
        .unwrap();

    assert_eq!(executed, Executed::Status(Some(vec![Value::Int(0)])));
    assert_eq!(cursor.fetchone().await.unwrap(), None);
    assert!(cursor.fetchall().await.unwrap().is_empty());
    assert_eq!(mock.result_calls().len(), 1);
}

#[tokio::test]
async fn test_select_reads_both_pages_in_order() {
    let columns = [column("id", "integer"), column("name", "varchar")];
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded()
            .with_page(page(&columns, &[&["1", "a"], &["2", "b"]], true, Some("page-2")))
            .with_page(page(&columns, &[&["3", "c"]], false, None)),
    );
    let mut cursor = rows_cursor(&mock);

    assert_eq!(
        cursor.execute("SELECT id, name FROM t", None).await.unwrap(),
        Executed::ResultSet
    );
    let names: Vec<&str> = cursor
        .description()
        .unwrap()
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["id", "name"]);

    let rows = cursor.fetchall().await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::String("a".to_string())],
            vec![Value::Int(2), Value::String("b".to_string())],
            vec![Value::Int(3), Value::String("c".to_string())],
        ]
    );

    let calls = mock.result_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, None);
    assert_eq!(calls[1].1.as_deref(), Some("page-2"));
}

#[tokio::test]
async fn test_fetchmany_across_pages() {
    let columns = [column("n", "integer")];
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded()
            .with_page(page(&columns, &[&["1"], &["2"]], true, Some("next")))
            .with_page(page(&columns, &[&["3"]], false, None)),
    );
    let mut cursor = rows_cursor(&mock);
    cursor.execute("SELECT n FROM t", None).await.unwrap();

    assert_eq!(cursor.fetchmany(3).await.unwrap().len(), 3);
    assert!(cursor.fetchmany(3).await.unwrap().is_empty());
    assert_eq!(cursor.fetchone().await.unwrap(), None);
}

#[tokio::test]
async fn test_columnar_table_from_rows_reader_fails_before_any_call() {
    let mock = Arc::new(MockQueryService::new());
    let mut cursor = rows_cursor(&mock);
    assert_eq!(cursor.kind(), ReaderKind::Rows);

    let err = cursor.to_arrow().await.unwrap_err();
    assert_eq!(err.category(), "Programming Error");
    let err = cursor
        .to_parquet(std::path::Path::new("out.parquet"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Programming Error");

    assert!(mock.requests().is_empty());
    assert_eq!(mock.status_calls(), 0);

    // The guard does not depend on having executed anything.
    cursor.execute("SELECT 1", None).await.unwrap();
    assert!(cursor.to_arrow().await.is_err());
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn test_columnar_cursor_fetches_exported_rows() {
    let storage = ObjectStorage::in_memory();
    put(&storage, "s3://bucket/out/a.parquet", parquet_bytes(&sales(&[1, 2], &["eu", "us"]))).await;
    put(&storage, "s3://bucket/out/b.parquet", parquet_bytes(&sales(&[3], &["eu"]))).await;
    let manifest = put_manifest(
        &storage,
        "q1",
        &[
            "s3://bucket/out/a.parquet".to_string(),
            "s3://bucket/out/b.parquet".to_string(),
        ],
    )
    .await;

    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest));
    let mut cursor = columnar_cursor(&mock, &storage);

    cursor.execute("SELECT * FROM sales", None).await.unwrap();
    assert_eq!(cursor.rowcount(), 3);
    assert_eq!(
        cursor.fetchone().await.unwrap(),
        Some(vec![Value::Int(1), Value::String("eu".to_string())])
    );
    assert_eq!(cursor.fetchall().await.unwrap().len(), 2);
    assert!(mock.queries()[0].starts_with("UNLOAD (\n\tSELECT * FROM sales\n)"));
}

#[tokio::test]
async fn test_mutation_on_columnar_reader_is_submitted_as_is() {
    let storage = ObjectStorage::in_memory();
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_page(ResultPage {
        update_count: Some(12),
        ..Default::default()
    }));
    let mut cursor = columnar_cursor(&mock, &storage);

    let executed = cursor
        .execute("  insert into t select * from s", None)
        .await
        .unwrap();

    assert_eq!(executed, Executed::Status(None));
    assert_eq!(mock.queries(), vec!["  insert into t select * from s"]);
    assert_eq!(cursor.rowcount(), 12);
}

#[tokio::test]
async fn test_with_clause_is_not_a_mutation() {
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded().with_page(page(&[column("n", "integer")], &[&["5"]], true, None)),
    );
    let mut cursor = rows_cursor(&mock);

    let executed = cursor
        .execute("WITH x AS (SELECT 5 AS n) SELECT n FROM x -- then DELETE", None)
        .await
        .unwrap();
    assert_eq!(executed, Executed::ResultSet);
    assert_eq!(cursor.fetchall().await.unwrap(), vec![vec![Value::Int(5)]]);
}

#[tokio::test]
async fn test_failed_execution_surfaces_database_error() {
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::failed(None).with_reason("line 1:8: Column 'x' cannot be resolved"));
    let mut cursor = rows_cursor(&mock);

    let err = cursor.execute("SELECT x FROM t", None).await.unwrap_err();
    assert!(err.is_database_error());
    assert!(err.to_string().contains("cannot be resolved"));
}

#[tokio::test]
async fn test_positional_parameters() {
    let mock = Arc::new(MockQueryService::new());
    let mut cursor = rows_cursor(&mock);
    let params = Parameters::Positional(vec![Value::Int(3), Value::list(["a", "b"])]);

    cursor
        .execute("SELECT * FROM t WHERE id = {} AND code IN ({})", Some(&params))
        .await
        .unwrap();

    assert_eq!(
        mock.queries(),
        vec!["SELECT * FROM t WHERE id = 3 AND code IN ('a', 'b')"]
    );
}

#[tokio::test]
async fn test_frame_from_engine_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("part.parquet");
    athena_cursor::result::write_parquet_file(&sales(&[7, 8], &["eu", "us"]), &file).unwrap();

    let storage = ObjectStorage::in_memory();
    let manifest = put_manifest(&storage, "q2", &[file.to_string_lossy().to_string()]).await;
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest.clone()));
    mock.push_execution(MockExecution::succeeded().with_manifest(manifest));

    let mut cursor = engine_cursor(&mock, &storage, dir.path());
    cursor.execute("SELECT * FROM sales", None).await.unwrap();
    let frame = cursor.to_frame().await.unwrap();

    assert_eq!(frame.columns, vec!["id", "region"]);
    assert_eq!(frame.len(), 2);
    assert_eq!(mock.queries().len(), 2);
}
