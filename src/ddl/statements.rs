//! Statement builders for warehouse tables.
//!
//! DDL quotes identifiers with backticks; DML (insert, merge) uses double
//! quotes.

use serde::{Deserialize, Serialize};

use super::partition;
use crate::convert::{quote_string, ColumnType};
use crate::error::{AthenaError, Result};

/// Default codec of external tables.
pub const EXTERNAL_COMPRESSION: &str = "GZIP";

/// Default codec of versioned tables.
pub const VERSIONED_COMPRESSION: &str = "snappy";

/// `` `schema`.`table` ``
pub fn ddl_name(schema: &str, table: &str) -> String {
    format!("`{schema}`.`{table}`")
}

/// `"schema"."table"`
pub fn dml_name(schema: &str, table: &str) -> String {
    format!("\"{schema}\".\"{table}\"")
}

fn dml_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[&ColumnType]) -> String {
    columns
        .iter()
        .map(|c| format!("`{}` {}", c.name, c.ddl_type))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Splits columns into regular and partition columns, in partition order.
///
/// Partition specs must name existing columns; transforms are rejected.
pub fn split_partitions<'a>(
    columns: &'a [ColumnType],
    partitions: &[String],
) -> Result<(Vec<&'a ColumnType>, Vec<&'a ColumnType>)> {
    let mut keys = Vec::with_capacity(partitions.len());
    for spec in partitions {
        if partition::is_transform(spec) {
            return Err(AthenaError::value(format!(
                "Partition transform {spec} requires a versioned table"
            )));
        }
        let name = partition::column_name(spec);
        let column = columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AthenaError::value(format!("Partition column {name} does not exist")))?;
        keys.push(column);
    }

    let regular = columns
        .iter()
        .filter(|c| !keys.iter().any(|k| k.name == c.name))
        .collect();
    Ok((regular, keys))
}

/// `CREATE EXTERNAL TABLE` over parquet files under `location`.
pub fn create_external_table(
    schema: &str,
    table: &str,
    columns: &[ColumnType],
    partitions: &[String],
    location: &str,
    compression: &str,
) -> Result<String> {
    let (regular, keys) = split_partitions(columns, partitions)?;

    let mut sql = format!(
        "CREATE EXTERNAL TABLE {} (\n{}\n)",
        ddl_name(schema, table),
        column_list(&regular)
    );
    if !keys.is_empty() {
        sql.push_str(&format!("\nPARTITIONED BY (\n{}\n)", column_list(&keys)));
    }
    sql.push_str(&format!(
        "\nSTORED AS PARQUET\nLOCATION {}\nTBLPROPERTIES ('parquet.compress'={})",
        quote_string(location),
        quote_string(compression)
    ));
    Ok(sql)
}

/// `CREATE TABLE` for a versioned (Iceberg) table.
///
/// `columns` should already carry versioned type names. Partition specs may
/// use transforms and are normalized.
pub fn create_versioned_table(
    schema: &str,
    table: &str,
    columns: &[ColumnType],
    partitions: &[String],
    location: &str,
    compression: &str,
) -> String {
    let all: Vec<&ColumnType> = columns.iter().collect();
    let mut sql = format!(
        "CREATE TABLE {} (\n{}\n)",
        ddl_name(schema, table),
        column_list(&all)
    );
    if !partitions.is_empty() {
        let specs: Vec<String> = partitions.iter().map(|p| partition::normalize(p)).collect();
        sql.push_str(&format!("\nPARTITIONED BY ({})", specs.join(", ")));
    }
    sql.push_str(&format!(
        "\nLOCATION {}\nTBLPROPERTIES (\n\
         \t'table_type'='ICEBERG',\n\
         \t'format'='parquet',\n\
         \t'write_compression'={},\n\
         \t'optimize_rewrite_delete_file_threshold'='10'\n)",
        quote_string(location),
        quote_string(compression)
    ));
    sql
}

pub fn drop_table(schema: &str, table: &str) -> String {
    format!("DROP TABLE {}", ddl_name(schema, table))
}

/// Registers partitions written outside the catalog.
pub fn repair_table(schema: &str, table: &str) -> String {
    format!("MSCK REPAIR TABLE {}", ddl_name(schema, table))
}

pub fn insert_from(schema: &str, target: &str, source: &str) -> String {
    format!(
        "INSERT INTO {} SELECT * FROM {}",
        dml_name(schema, target),
        dml_name(schema, source)
    )
}

/// What a merge clause does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// `WHEN MATCHED ... THEN DELETE`
    Delete,
    /// `WHEN MATCHED ... THEN UPDATE SET` every source column.
    Update,
    /// `WHEN NOT MATCHED ... THEN INSERT` every source column.
    Insert,
}

/// One `WHEN` clause of a merge, with an optional extra condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeClause {
    pub action: MergeAction,
    #[serde(default)]
    pub condition: Option<String>,
}

impl MergeClause {
    pub fn new(action: MergeAction) -> Self {
        Self {
            action,
            condition: None,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Update matched rows and insert the rest.
pub fn upsert_clauses() -> Vec<MergeClause> {
    vec![
        MergeClause::new(MergeAction::Update),
        MergeClause::new(MergeAction::Insert),
    ]
}

/// Builds a `MERGE` of `source` into `target`.
///
/// Update and insert column lists come from `columns`, the source's schema.
pub fn merge(
    schema: &str,
    target: &str,
    source: &str,
    aliases: (&str, &str),
    predicate: &str,
    columns: &[ColumnType],
    clauses: &[MergeClause],
) -> Result<String> {
    if clauses.is_empty() {
        return Err(AthenaError::value("A merge needs at least one clause"));
    }
    let (t, s) = aliases;

    let mut sql = format!(
        "MERGE INTO {} AS {t}\nUSING {} AS {s}\nON ({predicate})",
        dml_name(schema, target),
        dml_name(schema, source)
    );

    for clause in clauses {
        let condition = clause
            .condition
            .as_deref()
            .map(|c| format!(" AND {c}"))
            .unwrap_or_default();
        let body = match clause.action {
            MergeAction::Delete => format!("WHEN MATCHED{condition} THEN DELETE"),
            MergeAction::Update => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = {s}.{}", dml_ident(&c.name), dml_ident(&c.name)))
                    .collect();
                format!("WHEN MATCHED{condition} THEN UPDATE SET {}", sets.join(", "))
            }
            MergeAction::Insert => {
                let names: Vec<String> = columns.iter().map(|c| dml_ident(&c.name)).collect();
                let values: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{s}.{}", dml_ident(&c.name)))
                    .collect();
                format!(
                    "WHEN NOT MATCHED{condition} THEN INSERT ({}) VALUES ({})",
                    names.join(", "),
                    values.join(", ")
                )
            }
        };
        sql.push('\n');
        sql.push_str(&body);
    }

    Ok(sql)
}
