//! athena-cursor - query execution and result materialization for Amazon Athena.
//!
//! Statements are submitted through an [`query::ExecutionClient`] and their
//! results read back by one of three readers: the paginated results API,
//! a parquet export decoded into Arrow, or a parquet export handed to an
//! embedded DuckDB engine. [`cursor::Cursor`] puts the three behind one
//! interface and [`ddl::TableWriter`] writes local data back as warehouse
//! tables.

pub mod aws;
pub mod classify;
pub mod config;
pub mod convert;
pub mod cursor;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod logging;
pub mod query;
pub mod reader;
pub mod result;
pub mod service;
pub mod storage;

pub use cursor::{Cursor, Executed};
pub use error::{AthenaError, Result};
pub use reader::ReaderKind;
