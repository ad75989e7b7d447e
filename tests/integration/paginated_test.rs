//! Paginated-rows reader integration tests.

use std::sync::Arc;

use athena_cursor::convert::Value;
use athena_cursor::reader::PaginatedReader;
use athena_cursor::service::{MockExecution, MockQueryService};
use bigdecimal::BigDecimal;
use std::str::FromStr;

use super::common::{client, column, page};

#[tokio::test]
async fn test_typed_cells_are_decoded() {
    let columns = [
        column("flag", "boolean"),
        column("amount", "decimal"),
        column("day", "date"),
        column("payload", "varbinary"),
        column("note", "varchar"),
    ];
    let mock = Arc::new(MockQueryService::new());
    let mut first = page(
        &columns,
        &[&["true", "10.250", "2024-03-01", "68 69", "x"]],
        true,
        None,
    );
    // A NULL cell arrives without a value.
    first.rows.push(vec![None, Some(String::new()), None, None, None]);
    mock.push_execution(MockExecution::succeeded().with_page(first));

    let reader = PaginatedReader::new(client(&mock));
    let mut stream = reader.execute("SELECT * FROM t", false).await.unwrap();

    let row = stream.next_row().await.unwrap().unwrap();
    assert_eq!(row[0], Value::Bool(true));
    assert_eq!(row[1], Value::Decimal(BigDecimal::from_str("10.250").unwrap()));
    assert_eq!(row[2].to_string(), "2024-03-01");
    assert_eq!(row[3], Value::Bytes(b"hi".to_vec()));

    let nulls = stream.next_row().await.unwrap().unwrap();
    assert!(nulls.iter().all(Value::is_null));
    assert_eq!(stream.next_row().await.unwrap(), None);
}

#[tokio::test]
async fn test_descriptors_come_from_first_page_only() {
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded()
            .with_page(page(&[column("n", "integer")], &[&["1"]], true, Some("t2")))
            .with_page(page(&[column("other", "varchar")], &[&["2"]], false, None)),
    );

    let reader = PaginatedReader::new(client(&mock));
    let mut stream = reader.execute("SELECT n FROM t", false).await.unwrap();

    assert_eq!(stream.column_names(), vec!["n"]);
    assert_eq!(
        stream.remaining().await.unwrap(),
        vec![vec![Value::Int(1)], vec![Value::Int(2)]]
    );
    assert_eq!(stream.column_names(), vec!["n"]);
}

#[tokio::test]
async fn test_row_equal_to_header_on_later_page_is_kept() {
    let columns = [column("name", "varchar")];
    let mock = Arc::new(MockQueryService::new());
    mock.push_execution(
        MockExecution::succeeded()
            .with_page(page(&columns, &[&["a"]], true, Some("t2")))
            .with_page(page(&columns, &[&["name"]], false, None)),
    );

    let reader = PaginatedReader::new(client(&mock));
    let mut stream = reader.execute("SELECT name FROM t", false).await.unwrap();
    let rows = stream.remaining().await.unwrap();

    assert_eq!(
        rows,
        vec![
            vec![Value::String("a".to_string())],
            vec![Value::String("name".to_string())],
        ]
    );
}

#[tokio::test]
async fn test_reuse_flag_reaches_the_request() {
    let mock = Arc::new(MockQueryService::new());
    let reader = PaginatedReader::new(client(&mock));

    reader.execute("SELECT 1", true).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].result_reuse.is_some());
    assert_eq!(requests[0].database.as_deref(), Some("analytics"));
}
