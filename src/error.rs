//! Error types for athena-cursor.
//!
//! Defines the main error enum used throughout the crate.

use std::fmt;
use thiserror::Error;

use crate::service::ExecutionState;

/// Structured error detail reported by the query service for a failed execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Error category (1 = system, 2 = user, 3 = other).
    pub category: Option<i32>,
    /// Service-specific error type code.
    pub error_type: Option<i32>,
    /// Whether the service considers the failure retryable.
    pub retryable: bool,
    /// Human-readable message.
    pub message: Option<String>,
}

/// Why a remote execution did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// Identifier of the failed execution.
    pub execution_id: String,
    /// Terminal state (failed or cancelled).
    pub state: ExecutionState,
    /// Structured error detail, when the service returned one.
    pub detail: Option<ErrorDetail>,
    /// Free-form state change reason, when the service returned one.
    pub reason: Option<String>,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => {
                write!(f, "execution {} {}", self.execution_id, self.state)?;
                if let Some(category) = detail.category {
                    write!(f, " [category {category}")?;
                    if let Some(error_type) = detail.error_type {
                        write!(f, ", type {error_type}")?;
                    }
                    write!(f, "]")?;
                }
                if let Some(message) = detail.message.as_deref().or(self.reason.as_deref()) {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            None => match &self.reason {
                Some(reason) => write!(f, "execution {} {}: {reason}", self.execution_id, self.state),
                None => write!(f, "Failed to connect to database"),
            },
        }
    }
}

/// Main error type for athena-cursor operations.
#[derive(Error, Debug)]
pub enum AthenaError {
    /// Remote execution failed or was cancelled.
    #[error("Database error: {0}")]
    Database(Box<ExecutionFailure>),

    /// Operation not supported by the active reader, or a precondition was not met.
    #[error("Programming error: {0}")]
    Programming(String),

    /// Malformed input value (storage location, parameter, unsupported column type).
    #[error("Value error: {0}")]
    Value(String),

    /// A result cell could not be decoded to its declared type.
    #[error("Decode error in column '{column}' ({type_name}): {message}")]
    Decode {
        column: String,
        type_name: String,
        message: String,
    },

    /// Transport or SDK failure talking to the query service.
    #[error("Service error: {0}")]
    Service(String),

    /// Object storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedded engine failure.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Columnar encoding failure (Arrow, Parquet, CSV).
    #[error("Format error: {0}")]
    Format(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local filesystem errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AthenaError {
    /// Creates a database error from a failed execution.
    pub fn database(failure: ExecutionFailure) -> Self {
        Self::Database(Box::new(failure))
    }

    /// Creates a programming error with the given message.
    pub fn programming(msg: impl Into<String>) -> Self {
        Self::Programming(msg.into())
    }

    /// Creates a value error with the given message.
    pub fn value(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    /// Creates a decode error for a cell of the given column.
    pub fn decode(
        column: impl Into<String>,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Decode {
            column: column.into(),
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a service error with the given message.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Creates a storage error with the given message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates an engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates a format error with the given message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true when the error came from a failed or cancelled execution.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Database(_) => "Database Error",
            Self::Programming(_) => "Programming Error",
            Self::Value(_) => "Value Error",
            Self::Decode { .. } => "Decode Error",
            Self::Service(_) => "Service Error",
            Self::Storage(_) => "Storage Error",
            Self::Engine(_) => "Engine Error",
            Self::Format(_) => "Format Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

impl From<duckdb::Error> for AthenaError {
    fn from(e: duckdb::Error) -> Self {
        Self::Engine(e.to_string())
    }
}

impl From<object_store::Error> for AthenaError {
    fn from(e: object_store::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for AthenaError {
    fn from(e: arrow::error::ArrowError) -> Self {
        Self::Format(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for AthenaError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Self::Format(e.to_string())
    }
}

/// Result type alias using AthenaError.
pub type Result<T> = std::result::Result<T, AthenaError>;
