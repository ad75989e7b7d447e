//! Table definitions and writes.
//!
//! `statements` renders DDL/DML text; `writer` drives multi-step table
//! writes through the engine reader and the query service.

pub mod partition;
pub mod statements;
mod writer;

pub use statements::{MergeAction, MergeClause, EXTERNAL_COMPRESSION, VERSIONED_COMPRESSION};
pub use writer::{
    IfExists, MergeSpec, StepOutcome, TableWriter, WriteOptions, WriteReport, WriteSource,
    WriteStep,
};
