//! Query service abstraction.
//!
//! Provides a trait-based interface over the remote SQL query service, so the
//! execution client and readers can run against Amazon Athena or an in-process
//! mock interchangeably.

mod athena;
mod mock;
mod types;

pub use athena::AthenaService;
pub use mock::{MockExecution, MockQueryService};
pub use types::{
    ExecutionState, ExecutionStatistics, QueryExecution, ResultPage, ResultReuse, ServiceColumn,
    StartExecutionRequest, TableColumn, TableListPage, TableMetadata,
};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the remote query service operations.
///
/// All operations are async and return Results with AthenaError.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a statement and returns its execution id.
    async fn start_execution(&self, request: &StartExecutionRequest) -> Result<String>;

    /// Reads the current status of an execution.
    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution>;

    /// Reads one page of an execution's result set.
    async fn get_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: i32,
    ) -> Result<ResultPage>;

    /// Looks up catalog metadata for a table. Returns `None` when it does not exist.
    async fn get_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<Option<TableMetadata>>;

    /// Reads one page of the table listing of a database.
    async fn list_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        next_token: Option<&str>,
        max_results: i32,
    ) -> Result<TableListPage>;
}
