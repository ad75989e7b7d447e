//! Mock query service for testing.
//!
//! Provides an in-memory, scripted implementation of `QueryService`. Each
//! submitted statement consumes the next scripted `MockExecution` (or a default
//! successful one), and every request is recorded for later inspection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    ExecutionState, ExecutionStatistics, QueryExecution, QueryService, ResultPage,
    StartExecutionRequest, TableListPage, TableMetadata,
};
use crate::error::{AthenaError, ErrorDetail, Result};

/// Scripted behavior of one execution.
#[derive(Debug, Clone)]
pub struct MockExecution {
    /// States returned by successive status reads; the last one repeats.
    pub states: Vec<ExecutionState>,
    pub error: Option<ErrorDetail>,
    pub state_change_reason: Option<String>,
    pub statement_type: Option<String>,
    pub statistics: ExecutionStatistics,
    /// Result pages, chained by their `next_token`.
    pub pages: Vec<ResultPage>,
}

impl MockExecution {
    /// An execution that succeeds on the first status read.
    pub fn succeeded() -> Self {
        Self {
            states: vec![ExecutionState::Succeeded],
            error: None,
            state_change_reason: None,
            statement_type: None,
            statistics: ExecutionStatistics::default(),
            pages: Vec::new(),
        }
    }

    /// An execution that fails on the first status read.
    pub fn failed(error: Option<ErrorDetail>) -> Self {
        Self {
            states: vec![ExecutionState::Failed],
            error,
            ..Self::succeeded()
        }
    }

    /// Sets the sequence of states returned by status reads.
    pub fn with_states(mut self, states: Vec<ExecutionState>) -> Self {
        self.states = states;
        self
    }

    /// Sets the statement type (DDL, DML, UTILITY).
    pub fn with_statement_type(mut self, statement_type: impl Into<String>) -> Self {
        self.statement_type = Some(statement_type.into());
        self
    }

    /// Sets the manifest location reported in the statistics.
    pub fn with_manifest(mut self, location: impl Into<String>) -> Self {
        self.statistics.data_manifest_location = Some(location.into());
        self
    }

    /// Appends a result page.
    pub fn with_page(mut self, page: ResultPage) -> Self {
        self.pages.push(page);
        self
    }

    /// Sets the state change reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_change_reason = Some(reason.into());
        self
    }
}

#[derive(Debug)]
struct RunningExecution {
    script: MockExecution,
    query: String,
    polls: usize,
}

#[derive(Debug, Default)]
struct MockState {
    scripted: VecDeque<MockExecution>,
    executions: HashMap<String, RunningExecution>,
    requests: Vec<StartExecutionRequest>,
    status_calls: usize,
    result_calls: Vec<(String, Option<String>)>,
    tables: HashMap<(String, String, String), TableMetadata>,
    next_id: usize,
}

/// A query service that replays scripted executions.
#[derive(Debug, Default)]
pub struct MockQueryService {
    state: Mutex<MockState>,
}

impl MockQueryService {
    /// Creates a mock with no scripted executions.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked mid-assertion.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues the behavior of the next submitted statement.
    pub fn push_execution(&self, execution: MockExecution) {
        self.lock().scripted.push_back(execution);
    }

    /// Registers catalog metadata for a table.
    pub fn add_table(&self, catalog: &str, database: &str, metadata: TableMetadata) {
        let key = (
            catalog.to_string(),
            database.to_string(),
            metadata.name.clone(),
        );
        self.lock().tables.insert(key, metadata);
    }

    /// Returns every start request received so far.
    pub fn requests(&self) -> Vec<StartExecutionRequest> {
        self.lock().requests.clone()
    }

    /// Returns the statements submitted so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.query.clone()).collect()
    }

    /// Returns the number of status reads served.
    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    /// Returns the (execution id, token) pairs of every results call.
    pub fn result_calls(&self) -> Vec<(String, Option<String>)> {
        self.lock().result_calls.clone()
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn start_execution(&self, request: &StartExecutionRequest) -> Result<String> {
        let mut state = self.lock();
        state.next_id += 1;
        let execution_id = format!("mock-{:04}", state.next_id);
        let script = state
            .scripted
            .pop_front()
            .unwrap_or_else(MockExecution::succeeded);

        state.requests.push(request.clone());
        state.executions.insert(
            execution_id.clone(),
            RunningExecution {
                script,
                query: request.query.clone(),
                polls: 0,
            },
        );

        Ok(execution_id)
    }

    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution> {
        let mut state = self.lock();
        state.status_calls += 1;
        let running = state
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| AthenaError::service(format!("Unknown execution {execution_id}")))?;

        let index = running.polls.min(running.script.states.len().saturating_sub(1));
        let current = running
            .script
            .states
            .get(index)
            .copied()
            .unwrap_or(ExecutionState::Succeeded);
        running.polls += 1;

        let mut execution = QueryExecution::new(execution_id, current);
        execution.query = Some(running.query.clone());
        execution.statement_type = running.script.statement_type.clone();
        if current.is_terminal() {
            execution.error = running.script.error.clone();
            execution.state_change_reason = running.script.state_change_reason.clone();
            execution.statistics = running.script.statistics.clone();
        }

        Ok(execution)
    }

    async fn get_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
        _max_results: i32,
    ) -> Result<ResultPage> {
        let mut state = self.lock();
        state
            .result_calls
            .push((execution_id.to_string(), next_token.map(String::from)));

        let running = state
            .executions
            .get(execution_id)
            .ok_or_else(|| AthenaError::service(format!("Unknown execution {execution_id}")))?;

        let index = match next_token {
            None => 0,
            Some(token) => running
                .script
                .pages
                .iter()
                .position(|p| p.next_token.as_deref() == Some(token))
                .map(|i| i + 1)
                .ok_or_else(|| AthenaError::service(format!("Invalid token {token}")))?,
        };

        Ok(running.script.pages.get(index).cloned().unwrap_or_default())
    }

    async fn get_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        table: &str,
    ) -> Result<Option<TableMetadata>> {
        let key = (catalog.to_string(), database.to_string(), table.to_string());
        Ok(self.lock().tables.get(&key).cloned())
    }

    async fn list_table_metadata(
        &self,
        catalog: &str,
        database: &str,
        next_token: Option<&str>,
        max_results: i32,
    ) -> Result<TableListPage> {
        let state = self.lock();
        let mut tables: Vec<TableMetadata> = state
            .tables
            .iter()
            .filter(|((c, d, _), _)| c == catalog && d == database)
            .map(|(_, meta)| meta.clone())
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let offset: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let page_size = max_results.max(1) as usize;
        let end = (offset + page_size).min(tables.len());
        let next_token = (end < tables.len()).then(|| end.to_string());

        Ok(TableListPage {
            tables: tables.get(offset..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_token,
        })
    }
}
