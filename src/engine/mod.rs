//! Embedded analytical engine.
//!
//! Wraps a DuckDB connection configured to read exported parquet files from
//! S3 through the `httpfs` extension. Engine calls are synchronous; async
//! callers go through `run_blocking`.

use std::path::Path;

use duckdb::Connection;
use tracing::debug;

use crate::aws::AwsCredentials;
use crate::config::EngineConfig;
use crate::convert::quote_string;
use crate::error::{AthenaError, Result};
use crate::result::{read_parquet_file, ColumnarTable};

/// Name of the S3 secret registered on every engine connection.
pub const SECRET_NAME: &str = "athena_s3";

/// A configured engine connection.
#[derive(Debug)]
pub struct Engine {
    conn: Connection,
}

impl Engine {
    /// Opens a connection to `database`, or to an in-memory database.
    ///
    /// Applies thread and ordering settings, then loads `httpfs` and
    /// registers `credentials` as an S3 secret when the extension is enabled.
    pub fn open(
        database: Option<&Path>,
        config: &EngineConfig,
        credentials: Option<&AwsCredentials>,
    ) -> Result<Self> {
        let conn = match database {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        conn.execute_batch(&format!(
            "SET threads = {}; SET preserve_insertion_order = false;",
            config.effective_threads()
        ))?;

        if config.httpfs {
            conn.execute_batch("INSTALL httpfs; LOAD httpfs;")?;
            if let Some(credentials) = credentials {
                conn.execute_batch(&secret_statement(credentials))?;
            }
        }

        debug!(
            database = %database.map_or_else(|| ":memory:".into(), |p| p.display().to_string()),
            httpfs = config.httpfs,
            "Opened engine connection"
        );
        Ok(Self { conn })
    }

    /// Opens another connection to the same database.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            conn: self.conn.try_clone()?,
        })
    }

    /// Runs one or more statements that return no rows.
    pub fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "Engine statement");
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Runs a query and materializes its result.
    ///
    /// The result is written to a temporary parquet file by the engine and
    /// decoded with the `parquet` crate. The engine links its own `arrow`
    /// release, so its record batches are not this crate's `RecordBatch`.
    pub fn query_table(&self, sql: &str) -> Result<ColumnarTable> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("result.parquet");
        self.copy_to(sql, &path.to_string_lossy(), "FORMAT PARQUET")?;
        read_parquet_file(&path)
    }

    /// Writes a query's result to `target` with the given `COPY` options.
    pub fn copy_to(&self, sql: &str, target: &str, options: &str) -> Result<()> {
        self.execute(&format!(
            "COPY ({}) TO {} ({options})",
            strip_terminator(sql),
            quote_string(target)
        ))
    }

    /// Returns (column name, engine type) pairs of a query's result.
    pub fn describe(&self, sql: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("DESCRIBE {}", strip_terminator(sql)))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Returns true if a table with this name exists in the database.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Statement registering S3 credentials with the engine.
pub fn secret_statement(credentials: &AwsCredentials) -> String {
    let mut options = vec![
        "TYPE s3".to_string(),
        format!("KEY_ID {}", quote_string(&credentials.access_key_id)),
        format!("SECRET {}", quote_string(&credentials.secret_access_key)),
    ];
    if let Some(region) = &credentials.region {
        options.push(format!("REGION {}", quote_string(region)));
    }
    if let Some(token) = &credentials.session_token {
        options.push(format!("SESSION_TOKEN {}", quote_string(token)));
    }
    format!(
        "CREATE SECRET IF NOT EXISTS {SECRET_NAME} ({})",
        options.join(", ")
    )
}

/// `read_parquet(...)` over one file or a list of files.
pub fn parquet_source<S: AsRef<str>>(files: &[S]) -> String {
    match files {
        [single] => format!("read_parquet({})", quote_string(single.as_ref())),
        _ => {
            let quoted: Vec<String> = files.iter().map(|f| quote_string(f.as_ref())).collect();
            format!("read_parquet([{}])", quoted.join(", "))
        }
    }
}

/// Double-quotes an engine identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Runs engine work on the blocking thread pool.
pub async fn run_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AthenaError::engine(format!("Engine task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Value;
    use pretty_assertions::assert_eq;

    fn engine() -> Engine {
        Engine::open(None, &EngineConfig::local(), None).unwrap()
    }

    #[test]
    fn test_query_table() {
        let engine = engine();
        let table = engine
            .query_table("SELECT 1 AS id, 'a' AS name UNION ALL SELECT 2, 'b' ORDER BY id;")
            .unwrap();

        assert_eq!(table.column_names(), vec!["id", "name"]);
        assert_eq!(
            table.rows().unwrap(),
            vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::from("b")],
            ]
        );
    }

    #[test]
    fn test_describe_and_table_exists() {
        let engine = engine();
        engine
            .execute("CREATE TABLE sales (id BIGINT, price DECIMAL(10,2), tags VARCHAR[])")
            .unwrap();

        assert!(engine.table_exists("sales").unwrap());
        assert!(!engine.table_exists("missing").unwrap());

        let columns = engine.describe("SELECT * FROM sales").unwrap();
        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "BIGINT".to_string()),
                ("price".to_string(), "DECIMAL(10,2)".to_string()),
                ("tags".to_string(), "VARCHAR[]".to_string()),
            ]
        );
    }

    #[test]
    fn test_cloned_connection_shares_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.duckdb");
        let engine = Engine::open(Some(&path), &EngineConfig::local(), None).unwrap();
        engine.execute("CREATE TABLE t AS SELECT 1 AS x").unwrap();

        let clone = engine.try_clone().unwrap();
        assert!(clone.table_exists("t").unwrap());
    }

    #[test]
    fn test_copy_to_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.parquet");
        let engine = engine();
        engine
            .copy_to(
                "SELECT range AS n FROM range(5)",
                &target.to_string_lossy(),
                "FORMAT PARQUET, COMPRESSION ZSTD",
            )
            .unwrap();

        let files = vec![target.to_string_lossy().to_string()];
        let table = engine
            .query_table(&format!("SELECT count(*) AS c FROM {}", parquet_source(&files)))
            .unwrap();
        assert_eq!(table.rows().unwrap(), vec![vec![Value::Int(5)]]);
    }

    #[test]
    fn test_parquet_source() {
        assert_eq!(parquet_source(&["s3://b/a"]), "read_parquet('s3://b/a')");
        assert_eq!(
            parquet_source(&["s3://b/a", "s3://b/b"]),
            "read_parquet(['s3://b/a', 's3://b/b'])"
        );
    }

    #[test]
    fn test_secret_statement() {
        let credentials = AwsCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "se'cret".to_string(),
            session_token: Some("tok".to_string()),
            region: Some("us-east-1".to_string()),
        };
        assert_eq!(
            secret_statement(&credentials),
            "CREATE SECRET IF NOT EXISTS athena_s3 (TYPE s3, KEY_ID 'AKIA', SECRET 'se''cret', \
             REGION 'us-east-1', SESSION_TOKEN 'tok')"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let value = run_blocking(|| Ok(40 + 2)).await.unwrap();
        assert_eq!(value, 42);
    }
}
