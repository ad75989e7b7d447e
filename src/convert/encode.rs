//! Rendering of typed values as SQL literals and parameter substitution.

use std::collections::HashMap;

use super::Value;
use crate::error::{AthenaError, Result};

/// Parameters substituted into a statement template.
///
/// Positional parameters fill `{}` / `{0}` placeholders; named parameters
/// fill `{name}` placeholders. Literal braces are written `{{` and `}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters {
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl From<Vec<Value>> for Parameters {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<HashMap<String, Value>> for Parameters {
    fn from(values: HashMap<String, Value>) -> Self {
        Self::Named(values)
    }
}

/// Quotes a string as a single-quoted SQL literal, doubling embedded quotes.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn render_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// Renders a value as a SQL literal safe for interpolation into a statement.
pub fn to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => render_float(*f),
        Value::Decimal(d) => format!("DECIMAL {}", quote_string(&d.to_plain_string())),
        Value::String(s) => quote_string(s),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("X'{hex}'")
        }
        Value::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S%.6f")),
        Value::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.6f")),
        Value::Json(j) => format!("JSON {}", quote_string(&j.to_string())),
        Value::List(items) => items
            .iter()
            .map(to_sql_literal)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Substitutes parameters into a statement template.
///
/// Without parameters the template is returned unchanged, braces included.
pub fn format_query(template: &str, params: Option<&Parameters>) -> Result<String> {
    let Some(params) = params else {
        return Ok(template.to_string());
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(AthenaError::value(format!(
                                "Unclosed placeholder in query: {{{field}"
                            )))
                        }
                    }
                }
                let value = resolve_placeholder(field.trim(), params, &mut next_auto)?;
                out.push_str(&to_sql_literal(value));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(AthenaError::value(
                    "Single '}' encountered in query template",
                ))
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn resolve_placeholder<'a>(
    field: &str,
    params: &'a Parameters,
    next_auto: &mut usize,
) -> Result<&'a Value> {
    match params {
        Parameters::Positional(values) => {
            let index = if field.is_empty() {
                let index = *next_auto;
                *next_auto += 1;
                index
            } else {
                field.parse::<usize>().map_err(|_| {
                    AthenaError::value(format!(
                        "Named placeholder '{{{field}}}' used with positional parameters"
                    ))
                })?
            };
            values.get(index).ok_or_else(|| {
                AthenaError::value(format!(
                    "Placeholder index {index} out of range ({} parameters)",
                    values.len()
                ))
            })
        }
        Parameters::Named(values) => {
            if field.is_empty() {
                return Err(AthenaError::value(
                    "Positional placeholder '{}' used with named parameters",
                ));
            }
            values
                .get(field)
                .ok_or_else(|| AthenaError::value(format!("Missing parameter '{field}'")))
        }
    }
}
