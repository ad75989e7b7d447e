//! Schema inference: local column types to warehouse DDL types.
//!
//! Two sources are supported: Arrow schemas of in-memory tables, and the
//! column types the embedded engine reports for files (`DESCRIBE`).

use arrow::datatypes::{DataType, Schema};

use crate::error::{AthenaError, Result};

/// A column name paired with its warehouse DDL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub name: String,
    pub ddl_type: String,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, ddl_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ddl_type: ddl_type.into(),
        }
    }
}

/// Maps an Arrow data type to a DDL type name.
///
/// Time-of-day and interval columns have no warehouse counterpart and are
/// rejected.
pub fn arrow_to_ddl(data_type: &DataType) -> Result<String> {
    let ddl = match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => "INT".to_string(),
        DataType::Int64 | DataType::UInt64 => "BIGINT".to_string(),
        DataType::Float16 | DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Timestamp(_, _) => "TIMESTAMP".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Duration(_) => "BIGINT".to_string(),
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => "BINARY".to_string(),
        DataType::Decimal128(precision, scale) | DataType::Decimal256(precision, scale) => {
            format!("DECIMAL({precision},{scale})")
        }
        DataType::List(field) | DataType::LargeList(field) | DataType::FixedSizeList(field, _) => {
            format!("ARRAY<{}>", arrow_to_ddl(field.data_type())?)
        }
        DataType::Dictionary(_, value) => arrow_to_ddl(value)?,
        DataType::Time32(_) | DataType::Time64(_) => {
            return Err(AthenaError::value(format!(
                "Unsupported column type {data_type}: time of day has no warehouse type"
            )))
        }
        DataType::Interval(_) => {
            return Err(AthenaError::value(format!(
                "Unsupported column type {data_type}"
            )))
        }
        _ => "STRING".to_string(),
    };
    Ok(ddl)
}

/// Infers DDL column types for every field of an Arrow schema, in order.
pub fn infer_arrow_schema(schema: &Schema) -> Result<Vec<ColumnType>> {
    schema
        .fields()
        .iter()
        .map(|field| {
            arrow_to_ddl(field.data_type())
                .map(|ddl| ColumnType::new(field.name(), ddl))
                .map_err(|e| match e {
                    AthenaError::Value(msg) => {
                        AthenaError::value(format!("Column '{}': {msg}", field.name()))
                    }
                    other => other,
                })
        })
        .collect()
}

/// Maps an embedded-engine column type name to a DDL type name.
pub fn engine_to_ddl(type_name: &str) -> Result<String> {
    let upper = type_name.trim().to_uppercase();

    if let Some(inner) = upper.strip_suffix("[]") {
        return Ok(format!("ARRAY<{}>", engine_to_ddl(inner)?));
    }
    if upper.starts_with("DECIMAL") {
        return Ok(upper);
    }
    if upper.starts_with("STRUCT") || upper.starts_with("MAP") || upper.starts_with("UNION") {
        return Ok("STRING".to_string());
    }

    let ddl = match upper.as_str() {
        "BOOLEAN" => "BOOLEAN",
        "TINYINT" => "TINYINT",
        "SMALLINT" => "SMALLINT",
        "INTEGER" => "INTEGER",
        "UTINYINT" | "USMALLINT" => "INT",
        "BIGINT" | "UINTEGER" => "BIGINT",
        "UBIGINT" | "HUGEINT" | "UHUGEINT" => "DECIMAL(38,0)",
        "FLOAT" => "FLOAT",
        "DOUBLE" => "DOUBLE",
        "DATE" => "DATE",
        "TIMESTAMP" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS"
        | "TIMESTAMP WITH TIME ZONE" => "TIMESTAMP",
        "BLOB" => "BINARY",
        "TIME" | "TIME WITH TIME ZONE" | "INTERVAL" => {
            return Err(AthenaError::value(format!(
                "Unsupported column type {type_name}"
            )))
        }
        _ => "STRING",
    };
    Ok(ddl.to_string())
}

/// Adjusts external-table DDL types to their versioned-table spelling.
pub fn versioned_type(ddl_type: &str) -> String {
    let upper = ddl_type.trim().to_uppercase();
    if let Some(inner) = upper
        .strip_prefix("ARRAY<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return format!("LIST<{}>", versioned_type(inner));
    }

    match upper.as_str() {
        "INTEGER" | "TINYINT" | "SMALLINT" => "INT".to_string(),
        "BIGINT" => "LONG".to_string(),
        "ARRAY" => "LIST".to_string(),
        _ => upper,
    }
}

/// Applies `versioned_type` to every column.
pub fn to_versioned_columns(columns: &[ColumnType]) -> Vec<ColumnType> {
    columns
        .iter()
        .map(|c| ColumnType::new(c.name.clone(), versioned_type(&c.ddl_type)))
        .collect()
}
