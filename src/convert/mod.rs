//! Type conversion between the remote service, Arrow, and the embedded engine.
//!
//! - `decode`: textual result cells to typed values
//! - `encode`: typed values to SQL literals, parameter substitution
//! - `schema`: local column types to warehouse DDL types

pub mod decode;
pub mod encode;
pub mod schema;
mod value;

pub use decode::{decode_cell, RemoteType};
pub use encode::{format_query, quote_string, to_sql_literal, Parameters};
pub use schema::{
    arrow_to_ddl, engine_to_ddl, infer_arrow_schema, to_versioned_columns, versioned_type,
    ColumnType,
};
pub use value::{Row, Value};
