//! Statement classification.
//!
//! Inspects the leading keyword of a SQL statement to decide whether it
//! mutates schema or data. Mutating statements yield a single status row
//! rather than a result set, and are submitted as-is by the export readers.

mod keyword;

pub use keyword::{classify, is_mutating, leading_keyword};

use std::fmt;

/// The kind of statement, decided from its first keyword only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    /// Common table expression; never mutating regardless of its body.
    With,
    Unload,
    Create,
    Drop,
    Alter,
    Rename,
    Insert,
    Update,
    Delete,
    Merge,
    Truncate,
    Vacuum,
    Optimize,
    Msck,
    /// Any other leading keyword (SHOW, DESCRIBE, EXPLAIN, ...).
    Other(String),
    /// No keyword found (empty or comment-only statement).
    Empty,
}

impl StatementKind {
    /// Maps an uppercased keyword to its statement kind.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "SELECT" => Self::Select,
            "WITH" => Self::With,
            "UNLOAD" => Self::Unload,
            "CREATE" => Self::Create,
            "DROP" => Self::Drop,
            "ALTER" => Self::Alter,
            "RENAME" => Self::Rename,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "MERGE" => Self::Merge,
            "TRUNCATE" => Self::Truncate,
            "VACUUM" => Self::Vacuum,
            "OPTIMIZE" => Self::Optimize,
            "MSCK" => Self::Msck,
            "" => Self::Empty,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if statements of this kind change schema or data.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::Drop
                | Self::Alter
                | Self::Rename
                | Self::Insert
                | Self::Update
                | Self::Delete
                | Self::Merge
                | Self::Truncate
                | Self::Vacuum
                | Self::Optimize
                | Self::Msck
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::With => write!(f, "WITH (CTE)"),
            Self::Unload => write!(f, "UNLOAD"),
            Self::Create => write!(f, "CREATE"),
            Self::Drop => write!(f, "DROP"),
            Self::Alter => write!(f, "ALTER"),
            Self::Rename => write!(f, "RENAME"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Merge => write!(f, "MERGE"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Vacuum => write!(f, "VACUUM"),
            Self::Optimize => write!(f, "OPTIMIZE"),
            Self::Msck => write!(f, "MSCK"),
            Self::Other(keyword) => write!(f, "{keyword}"),
            Self::Empty => write!(f, "Empty"),
        }
    }
}
