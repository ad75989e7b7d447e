//! Result readers.
//!
//! Three variants turn a finished execution into rows or a table:
//!
//! - `PaginatedReader` walks the results API page by page.
//! - `ColumnarReader` exports the query as parquet and decodes the files.
//! - `EngineReader` exports the query and hands the files to the embedded
//!   engine, which also backs local table loads and warehouse writes.
//!
//! A cursor uses exactly one variant; `ReaderKind::supports` tells which
//! operations each one offers.

mod columnar;
mod engine;
mod export;
mod paginated;

pub use columnar::ColumnarReader;
pub use engine::{BulkLoadReport, EngineReader};
pub use export::{unload_location, unload_statement, Export, UNLOAD_COMPRESSION, UNLOAD_FORMAT};
pub use paginated::{PaginatedReader, RowStream};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ReadFailurePolicy;
use crate::error::{AthenaError, Result};
use crate::query::ExecutionClient;
use crate::result::ColumnarTable;

/// The reader variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReaderKind {
    /// Paginated results API, rows decoded from text.
    Rows,
    /// Parquet export read into Arrow.
    Columnar,
    /// Parquet export read through the embedded engine.
    Engine,
}

/// Operations whose availability depends on the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Fetch,
    Frame,
    Arrow,
    Parquet,
    Csv,
    CreateTableDb,
    PartitionCreateTableDb,
    InsertTableDb,
    WriteTable,
}

impl Capability {
    /// Name of the cursor operation, used in error messages.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Frame => "to_frame",
            Self::Arrow => "to_arrow",
            Self::Parquet => "to_parquet",
            Self::Csv => "to_csv",
            Self::CreateTableDb => "to_create_table_db",
            Self::PartitionCreateTableDb => "to_partition_create_table_db",
            Self::InsertTableDb => "to_insert_table_db",
            Self::WriteTable => "write",
        }
    }
}

impl ReaderKind {
    /// Returns true if this reader offers the operation.
    pub fn supports(&self, capability: Capability) -> bool {
        match self {
            Self::Rows => matches!(capability, Capability::Fetch | Capability::Frame),
            Self::Columnar => matches!(
                capability,
                Capability::Fetch
                    | Capability::Frame
                    | Capability::Arrow
                    | Capability::Parquet
                    | Capability::Csv
            ),
            Self::Engine => true,
        }
    }

    /// Fails with a programming error when the operation is not offered.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(AthenaError::programming(format!(
                "{} is not supported by the {self} reader",
                capability.operation()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Columnar => "columnar",
            Self::Engine => "engine",
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active reader of a cursor.
#[derive(Debug, Clone)]
pub enum Reader {
    Rows(PaginatedReader),
    Columnar(ColumnarReader),
    Engine(EngineReader),
}

impl Reader {
    pub fn kind(&self) -> ReaderKind {
        match self {
            Self::Rows(_) => ReaderKind::Rows,
            Self::Columnar(_) => ReaderKind::Columnar,
            Self::Engine(_) => ReaderKind::Engine,
        }
    }

    pub fn client(&self) -> &ExecutionClient {
        match self {
            Self::Rows(reader) => reader.client(),
            Self::Columnar(reader) => reader.client(),
            Self::Engine(reader) => reader.client(),
        }
    }
}

/// Applies a read-failure policy to the outcome of reading exported files.
pub(crate) fn apply_read_policy(
    policy: ReadFailurePolicy,
    query: &str,
    outcome: Result<ColumnarTable>,
) -> Result<ColumnarTable> {
    match (outcome, policy) {
        (Ok(table), _) => Ok(table),
        (Err(e), ReadFailurePolicy::Propagate) => Err(e),
        (Err(e), ReadFailurePolicy::Empty) => {
            warn!(error = %e, query, "Reading exported results failed; returning an empty table");
            Ok(ColumnarTable::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(ReaderKind::Rows.supports(Capability::Fetch));
        assert!(!ReaderKind::Rows.supports(Capability::Arrow));
        assert!(!ReaderKind::Rows.supports(Capability::Parquet));
        assert!(ReaderKind::Columnar.supports(Capability::Csv));
        assert!(!ReaderKind::Columnar.supports(Capability::CreateTableDb));
        assert!(!ReaderKind::Columnar.supports(Capability::WriteTable));
        assert!(ReaderKind::Engine.supports(Capability::PartitionCreateTableDb));
    }

    #[test]
    fn test_require_names_operation_and_reader() {
        let err = ReaderKind::Rows.require(Capability::Arrow).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Programming error: to_arrow is not supported by the rows reader"
        );
        assert!(ReaderKind::Engine.require(Capability::WriteTable).is_ok());
    }

    #[test]
    fn test_read_policy() {
        let failed = || Err(AthenaError::storage("boom"));

        let err = apply_read_policy(ReadFailurePolicy::Propagate, "SELECT 1", failed());
        assert!(err.is_err());

        let table = apply_read_policy(ReadFailurePolicy::Empty, "SELECT 1", failed()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }
}
