//! Statement submission and status polling.
//!
//! `ExecutionClient::submit` starts an execution and polls its status at a
//! fixed interval until it is terminal. Failed and cancelled executions are
//! surfaced as database errors; nothing is retried.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::ExecutionHandle;
use crate::classify::classify;
use crate::config::SessionConfig;
use crate::error::{AthenaError, ExecutionFailure, Result};
use crate::service::{
    ExecutionState, QueryExecution, QueryService, ResultPage, ResultReuse, StartExecutionRequest,
    TableMetadata,
};

/// Page size used when listing table metadata.
pub const TABLE_LIST_PAGE_SIZE: i32 = 50;

/// Submits statements and waits for them to finish.
#[derive(Clone)]
pub struct ExecutionClient {
    service: Arc<dyn QueryService>,
    session: SessionConfig,
    staging_dir: String,
}

impl std::fmt::Debug for ExecutionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionClient")
            .field("session", &self.session)
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}

impl ExecutionClient {
    /// Creates a client. Fails if the session has no valid staging location.
    pub fn new(service: Arc<dyn QueryService>, session: SessionConfig) -> Result<Self> {
        let staging_dir = session.staging_dir()?;
        Ok(Self {
            service,
            session,
            staging_dir,
        })
    }

    pub fn service(&self) -> &Arc<dyn QueryService> {
        &self.service
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Staging location for query output, ending with `/`.
    pub fn staging_dir(&self) -> &str {
        &self.staging_dir
    }

    /// Submits a statement using the session's result reuse setting.
    pub async fn execute(&self, statement: &str) -> Result<ExecutionHandle> {
        self.submit(statement, self.session.result_reuse).await
    }

    /// Submits a statement and waits until its execution is terminal.
    pub async fn submit(&self, statement: &str, reuse_cached_results: bool) -> Result<ExecutionHandle> {
        let request = StartExecutionRequest {
            query: statement.to_string(),
            output_location: self.staging_dir.clone(),
            database: self.session.schema.clone(),
            catalog: Some(self.session.catalog.clone()),
            work_group: self.session.work_group.clone(),
            result_reuse: reuse_cached_results.then_some(ResultReuse {
                enabled: true,
                max_age_minutes: self.session.result_reuse_max_age_minutes,
            }),
        };

        let submitted_at = Utc::now();
        let execution_id = self.service.start_execution(&request).await?;
        debug!(%execution_id, "Submitted statement");

        let execution = self.wait(&execution_id).await?;
        Ok(ExecutionHandle::from_execution(
            statement,
            classify(statement),
            submitted_at,
            execution,
        ))
    }

    /// Polls an execution until it is terminal.
    ///
    /// Returns the final snapshot on success and a database error when the
    /// execution failed or was cancelled.
    pub async fn wait(&self, execution_id: &str) -> Result<QueryExecution> {
        let interval = self.session.poll_interval();

        let execution = loop {
            let execution = self.service.get_execution(execution_id).await?;
            debug!(%execution_id, state = %execution.state, "Polled execution");
            if execution.state.is_terminal() {
                break execution;
            }
            tokio::time::sleep(interval).await;
        };

        match execution.state {
            ExecutionState::Succeeded => {
                log_statistics(&execution);
                Ok(execution)
            }
            state => Err(AthenaError::database(ExecutionFailure {
                execution_id: execution.execution_id,
                state,
                detail: execution.error,
                reason: execution.state_change_reason,
            })),
        }
    }

    /// Reads one results page, sized by the session's page size.
    pub async fn get_results(&self, execution_id: &str, next_token: Option<&str>) -> Result<ResultPage> {
        self.service
            .get_results(execution_id, next_token, self.session.effective_page_size())
            .await
    }

    /// Looks up a table in the session's catalog. `None` when it does not exist.
    pub async fn table_metadata(&self, schema: &str, table: &str) -> Result<Option<TableMetadata>> {
        self.service
            .get_table_metadata(&self.session.catalog, schema, table)
            .await
    }

    /// Lists every table of a schema, following the listing's pagination.
    pub async fn list_tables(&self, schema: &str) -> Result<Vec<TableMetadata>> {
        let mut tables = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .service
                .list_table_metadata(
                    &self.session.catalog,
                    schema,
                    token.as_deref(),
                    TABLE_LIST_PAGE_SIZE,
                )
                .await?;
            tables.extend(page.tables);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(tables)
    }
}

fn log_statistics(execution: &QueryExecution) {
    let stats = &execution.statistics;
    info!(
        execution_id = %execution.execution_id,
        statement_type = execution.statement_type.as_deref().unwrap_or("-"),
        data_scanned_bytes = stats.data_scanned_bytes.unwrap_or(0),
        engine_time_ms = stats.engine_execution_time_ms.unwrap_or(0),
        total_time_ms = stats.total_execution_time_ms.unwrap_or(0),
        reused = stats.reused_previous_result,
        "Execution succeeded"
    );
}
