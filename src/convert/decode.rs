//! Decoding of textual result cells into typed values.
//!
//! The paginated results API returns every cell as text (or absent for NULL);
//! the declared column type selects the decoder.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::Value;
use crate::error::{AthenaError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Column types reported by the query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Char,
    Varchar,
    String,
    Timestamp,
    Date,
    Time,
    Varbinary,
    Array,
    Map,
    Row,
    Decimal,
    Json,
    /// Any type without a dedicated decoder; cells are kept as text.
    Other(std::string::String),
}

impl RemoteType {
    /// Parses a declared type name such as `integer` or `decimal(10,2)`.
    pub fn parse(type_name: &str) -> Self {
        let base = type_name
            .split(['(', '<'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match base.as_str() {
            "boolean" => Self::Boolean,
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "integer" | "int" => Self::Integer,
            "bigint" => Self::BigInt,
            "float" => Self::Float,
            "real" => Self::Real,
            "double" => Self::Double,
            "char" => Self::Char,
            "varchar" => Self::Varchar,
            "string" => Self::String,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "time" => Self::Time,
            "varbinary" => Self::Varbinary,
            "array" => Self::Array,
            "map" => Self::Map,
            "row" => Self::Row,
            "decimal" => Self::Decimal,
            "json" => Self::Json,
            _ => Self::Other(type_name.to_string()),
        }
    }

    /// Decodes one cell. `None` is the wire representation of NULL.
    pub fn decode(&self, cell: Option<&str>) -> std::result::Result<Value, String> {
        let Some(text) = cell else {
            return Ok(Value::Null);
        };

        match self {
            Self::Boolean => {
                if text.is_empty() {
                    Ok(Value::Null)
                } else {
                    parse_bool(text).map(Value::Bool)
                }
            }
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt => text
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string()),
            Self::Float | Self::Real | Self::Double => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            Self::Decimal => {
                if text.is_empty() {
                    Ok(Value::Null)
                } else {
                    BigDecimal::from_str(text.trim())
                        .map(Value::Decimal)
                        .map_err(|e| e.to_string())
                }
            }
            Self::Timestamp => NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .map(Value::Timestamp)
                .map_err(|e| e.to_string()),
            Self::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| e.to_string()),
            Self::Time => NaiveTime::parse_from_str(text, TIME_FORMAT)
                .map(Value::Time)
                .map_err(|e| e.to_string()),
            Self::Varbinary => decode_hex_pairs(text).map(Value::Bytes),
            Self::Json => serde_json::from_str(text)
                .map(Value::Json)
                .map_err(|e| e.to_string()),
            Self::Char
            | Self::Varchar
            | Self::String
            | Self::Array
            | Self::Map
            | Self::Row
            | Self::Other(_) => Ok(Value::String(text.to_string())),
        }
    }
}

/// Decodes a cell of the named column, attaching column context to failures.
pub fn decode_cell(column: &str, type_name: &str, cell: Option<&str>) -> Result<Value> {
    RemoteType::parse(type_name)
        .decode(cell)
        .map_err(|message| AthenaError::decode(column, type_name, message))
}

fn parse_bool(text: &str) -> std::result::Result<bool, String> {
    match text.trim().to_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        other => Err(format!("invalid truth value '{other}'")),
    }
}

/// Decodes space-separated hex byte pairs, e.g. `68 65 6c 6c 6f`.
fn decode_hex_pairs(text: &str) -> std::result::Result<Vec<u8>, String> {
    let digits: String = text.split_whitespace().collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{text}'"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .ok_or_else(|| format!("invalid hex in '{text}'"))
                .and_then(|pair| u8::from_str_radix(pair, 16).map_err(|e| e.to_string()))
        })
        .collect()
}
