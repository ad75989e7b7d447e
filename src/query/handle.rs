//! Execution handles.

use chrono::{DateTime, Utc};

use crate::classify::StatementKind;
use crate::service::{ExecutionState, ExecutionStatistics, QueryExecution};

/// Identity and terminal outcome of one submitted statement.
///
/// Handles are only created from terminal executions and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionHandle {
    pub execution_id: String,
    pub query: String,
    pub submitted_at: DateTime<Utc>,
    pub state: ExecutionState,
    /// Classification of the statement's leading keyword.
    pub kind: StatementKind,
    /// Service classification (DDL, DML, UTILITY).
    pub statement_type: Option<String>,
    pub substatement_type: Option<String>,
    pub statistics: ExecutionStatistics,
}

impl ExecutionHandle {
    pub(crate) fn from_execution(
        query: &str,
        kind: StatementKind,
        submitted_at: DateTime<Utc>,
        execution: QueryExecution,
    ) -> Self {
        Self {
            execution_id: execution.execution_id,
            query: query.to_string(),
            submitted_at: execution.submitted_at.unwrap_or(submitted_at),
            state: execution.state,
            kind,
            statement_type: execution.statement_type,
            substatement_type: execution.substatement_type,
            statistics: execution.statistics,
        }
    }

    /// Returns true if the statement changes schema or data.
    pub fn is_mutating(&self) -> bool {
        self.kind.is_mutating()
    }

    /// Location of the manifest listing the files this execution wrote.
    pub fn manifest_location(&self) -> Option<&str> {
        self.statistics.data_manifest_location.as_deref()
    }

    pub fn data_scanned_bytes(&self) -> Option<i64> {
        self.statistics.data_scanned_bytes
    }

    pub fn reused_previous_result(&self) -> bool {
        self.statistics.reused_previous_result
    }
}
