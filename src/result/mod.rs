//! Result representations.
//!
//! Column descriptors, the materialized columnar table, and a row-oriented
//! frame available from every reader.

mod arrow_value;
pub mod io;

pub use arrow_value::array_value;
pub use io::{read_parquet_bytes, read_parquet_file, write_csv_file, write_parquet_file, CSV_DELIMITER};

use std::fmt;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde::Serialize;

use crate::convert::{Row, Value};
use crate::error::Result;
use crate::service::ServiceColumn;

/// Nullability of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Nullability {
    NotNull,
    Nullable,
    Unknown,
}

impl Nullability {
    /// Parses the service spelling (NOT_NULL, NULLABLE, UNKNOWN).
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::to_uppercase).as_deref() {
            Some("NOT_NULL") => Self::NotNull,
            Some("NULLABLE") => Self::Nullable,
            _ => Self::Unknown,
        }
    }
}

/// Information about a column in a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Remote type name (e.g. `varchar`, `decimal`).
    pub type_name: String,
    pub precision: i32,
    pub scale: i32,
    pub nullable: Nullability,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            precision: 0,
            scale: 0,
            nullable: Nullability::Unknown,
        }
    }

    /// Builds a descriptor from service column metadata.
    pub fn from_service(column: &ServiceColumn) -> Self {
        Self {
            name: column.name.clone(),
            type_name: column.type_name.clone(),
            precision: column.precision,
            scale: column.scale,
            nullable: Nullability::parse(column.nullable.as_deref()),
        }
    }

    /// Builds descriptors from an Arrow schema.
    pub fn from_schema(schema: &Schema) -> Vec<Self> {
        schema
            .fields()
            .iter()
            .map(|field| {
                let (precision, scale) = match field.data_type() {
                    DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => {
                        (i32::from(*p), i32::from(*s))
                    }
                    _ => (0, 0),
                };
                Self {
                    name: field.name().clone(),
                    type_name: remote_type_name(field.data_type()),
                    precision,
                    scale,
                    nullable: if field.is_nullable() {
                        Nullability::Nullable
                    } else {
                        Nullability::NotNull
                    },
                }
            })
            .collect()
    }
}

/// The remote service's name for an Arrow type.
pub fn remote_type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Boolean => "boolean",
        DataType::Int8 => "tinyint",
        DataType::Int16 | DataType::UInt8 => "smallint",
        DataType::Int32 | DataType::UInt16 => "integer",
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => "bigint",
        DataType::Float16 | DataType::Float32 => "real",
        DataType::Float64 => "double",
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "varchar",
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => "varbinary",
        DataType::Date32 | DataType::Date64 => "date",
        DataType::Timestamp(_, _) => "timestamp",
        DataType::Time32(_) | DataType::Time64(_) => "time",
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => "decimal",
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => "array",
        DataType::Map(_, _) => "map",
        DataType::Struct(_) => "row",
        _ => "varchar",
    }
    .to_string()
}

/// A fully materialized columnar result.
#[derive(Debug, Clone)]
pub struct ColumnarTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ColumnarTable {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Arc::new(Schema::empty()), Vec::new())
    }

    /// Builds a table from batches, taking the schema of the first one.
    pub fn from_batches(batches: Vec<RecordBatch>) -> Self {
        match batches.first() {
            Some(first) => Self::new(first.schema(), batches),
            None => Self::empty(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    pub fn descriptors(&self) -> Vec<ColumnDescriptor> {
        ColumnDescriptor::from_schema(&self.schema)
    }

    /// Concatenates all batches into one.
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }

    /// Converts every row to values, in order.
    pub fn rows(&self) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            for index in 0..batch.num_rows() {
                let row = batch
                    .columns()
                    .iter()
                    .map(|column| array_value(column.as_ref(), index))
                    .collect::<Result<Row>>()?;
                rows.push(row);
            }
        }
        Ok(rows)
    }

    pub fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(self.column_names(), self.rows()?))
    }

    /// Renders the table as an ASCII grid.
    pub fn pretty(&self) -> Result<String> {
        Ok(pretty_format_batches(&self.batches)?.to_string())
    }
}

/// Row-oriented tabular data: column names plus rows of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the values of the named column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_display_string).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i).map(String::len))
                    .chain(std::iter::once(name.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_line(f, &self.columns, &widths)?;
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", separator.join("-+-"))?;
        for row in &cells {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, values: &[String], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(v, w)| format!("{v:<w$}", w = *w))
        .collect();
    writeln!(f, "{}", padded.join(" | ").trim_end())
}
