//! Conversion of Arrow array cells into `Value`s.

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Decimal128Type, Decimal256Type, Date64Type, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;

use crate::convert::Value;
use crate::error::{AthenaError, Result};

/// Reads the value at `index` of `array`.
pub fn array_value(array: &dyn Array, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(index)),
        DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(index).into()),
        DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(index).into()),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(index).into()),
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(index)),
        DataType::UInt8 => Value::Int(array.as_primitive::<UInt8Type>().value(index).into()),
        DataType::UInt16 => Value::Int(array.as_primitive::<UInt16Type>().value(index).into()),
        DataType::UInt32 => Value::Int(array.as_primitive::<UInt32Type>().value(index).into()),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(index);
            i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Decimal(BigDecimal::from(v)))
        }
        DataType::Float16 => {
            Value::Float(array.as_primitive::<Float16Type>().value(index).to_f64())
        }
        DataType::Float32 => {
            Value::Float(array.as_primitive::<Float32Type>().value(index).into())
        }
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(index)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(index).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(index).to_string()),
        DataType::Binary => Value::Bytes(array.as_binary::<i32>().value(index).to_vec()),
        DataType::LargeBinary => Value::Bytes(array.as_binary::<i64>().value(index).to_vec()),
        DataType::FixedSizeBinary(_) => {
            Value::Bytes(array.as_fixed_size_binary().value(index).to_vec())
        }
        DataType::Date32 => temporal(
            array.as_primitive::<Date32Type>().value_as_date(index),
            array,
        )
        .map(Value::Date)?,
        DataType::Date64 => temporal(
            array.as_primitive::<Date64Type>().value_as_date(index),
            array,
        )
        .map(Value::Date)?,
        DataType::Timestamp(unit, _) => {
            let ts = match unit {
                TimeUnit::Second => array
                    .as_primitive::<TimestampSecondType>()
                    .value_as_datetime(index),
                TimeUnit::Millisecond => array
                    .as_primitive::<TimestampMillisecondType>()
                    .value_as_datetime(index),
                TimeUnit::Microsecond => array
                    .as_primitive::<TimestampMicrosecondType>()
                    .value_as_datetime(index),
                TimeUnit::Nanosecond => array
                    .as_primitive::<TimestampNanosecondType>()
                    .value_as_datetime(index),
            };
            temporal(ts, array).map(Value::Timestamp)?
        }
        DataType::Time32(TimeUnit::Second) => temporal(
            array.as_primitive::<Time32SecondType>().value_as_time(index),
            array,
        )
        .map(Value::Time)?,
        DataType::Time32(_) => temporal(
            array
                .as_primitive::<Time32MillisecondType>()
                .value_as_time(index),
            array,
        )
        .map(Value::Time)?,
        DataType::Time64(TimeUnit::Nanosecond) => temporal(
            array
                .as_primitive::<Time64NanosecondType>()
                .value_as_time(index),
            array,
        )
        .map(Value::Time)?,
        DataType::Time64(_) => temporal(
            array
                .as_primitive::<Time64MicrosecondType>()
                .value_as_time(index),
            array,
        )
        .map(Value::Time)?,
        DataType::Decimal128(_, scale) => {
            let raw = array.as_primitive::<Decimal128Type>().value(index);
            Value::Decimal(BigDecimal::new(BigInt::from(raw), i64::from(*scale)))
        }
        DataType::Decimal256(_, scale) => {
            let raw = array.as_primitive::<Decimal256Type>().value(index);
            let unscaled = BigInt::from_signed_bytes_be(&raw.to_be_bytes());
            Value::Decimal(BigDecimal::new(unscaled, i64::from(*scale)))
        }
        DataType::List(_) => list_values(array.as_list::<i32>().value(index).as_ref())?,
        DataType::LargeList(_) => list_values(array.as_list::<i64>().value(index).as_ref())?,
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            Value::String(formatter.value(index).to_string())
        }
    };

    Ok(value)
}

fn list_values(values: &dyn Array) -> Result<Value> {
    (0..values.len())
        .map(|i| array_value(values, i))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn temporal<T>(value: Option<T>, array: &dyn Array) -> Result<T> {
    value.ok_or_else(|| {
        AthenaError::format(format!(
            "Value out of range for {}",
            array.data_type()
        ))
    })
}
