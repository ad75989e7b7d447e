//! Request and response types exchanged with the query service.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::ErrorDetail;

/// Remote execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionState {
    /// Parses a state name as reported by the service.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns the state name used by the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true once the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age-bounded reuse of cached query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultReuse {
    pub enabled: bool,
    pub max_age_minutes: i32,
}

/// Everything needed to start one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartExecutionRequest {
    pub query: String,
    pub output_location: String,
    pub database: Option<String>,
    pub catalog: Option<String>,
    pub work_group: Option<String>,
    pub result_reuse: Option<ResultReuse>,
}

/// Execution statistics reported once an execution finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionStatistics {
    /// Location of the manifest listing files written by the execution.
    pub data_manifest_location: Option<String>,
    pub data_scanned_bytes: Option<i64>,
    pub engine_execution_time_ms: Option<i64>,
    pub total_execution_time_ms: Option<i64>,
    pub reused_previous_result: bool,
}

/// Snapshot of an execution as returned by a status read.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExecution {
    pub execution_id: String,
    pub query: Option<String>,
    pub state: ExecutionState,
    pub state_change_reason: Option<String>,
    pub error: Option<ErrorDetail>,
    /// DDL, DML or UTILITY.
    pub statement_type: Option<String>,
    pub substatement_type: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub statistics: ExecutionStatistics,
}

impl QueryExecution {
    /// Creates a snapshot in the given state with no statistics.
    pub fn new(execution_id: impl Into<String>, state: ExecutionState) -> Self {
        Self {
            execution_id: execution_id.into(),
            query: None,
            state,
            state_change_reason: None,
            error: None,
            statement_type: None,
            substatement_type: None,
            submitted_at: None,
            statistics: ExecutionStatistics::default(),
        }
    }
}

/// Column metadata as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceColumn {
    pub name: String,
    pub type_name: String,
    pub precision: i32,
    pub scale: i32,
    /// NOT_NULL, NULLABLE or UNKNOWN.
    pub nullable: Option<String>,
}

/// One page of a paginated result set. Cells are the textual wire representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub columns: Vec<ServiceColumn>,
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
    pub update_count: Option<i64>,
}

/// A column of a catalog table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub type_name: Option<String>,
}

/// Catalog metadata for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadata {
    pub name: String,
    pub table_type: Option<String>,
    pub parameters: HashMap<String, String>,
    pub columns: Vec<TableColumn>,
    pub partition_keys: Vec<TableColumn>,
}

impl TableMetadata {
    /// Returns the object-storage location backing the table, if recorded.
    pub fn location(&self) -> Option<&str> {
        self.parameters.get("location").map(String::as_str)
    }
}

/// One page of a catalog table listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableListPage {
    pub tables: Vec<TableMetadata>,
    pub next_token: Option<String>,
}
