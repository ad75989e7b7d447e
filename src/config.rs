//! Configuration management for athena-cursor.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Three sections are recognized: `[aws]` credentials and region, `[session]`
//! execution context, and `[engine]` settings of the embedded engine.

use crate::error::{AthenaError, Result};
use crate::service::ResultReuse;
use crate::storage::S3Location;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default catalog of the query service.
pub const DEFAULT_CATALOG: &str = "awsdatacatalog";

/// Maximum page size accepted by the results API.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// AWS credentials and region.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Execution context of a session.
    #[serde(default)]
    pub session: SessionConfig,

    /// Embedded engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// AWS credentials and region.
///
/// Credentials left unset are resolved through the SDK default provider chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    /// Secret access key (not recommended to store in config).
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Endpoint override for the query service and object storage.
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    /// Applies AWS_* environment variables as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.region.is_none() {
            self.region = std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .ok();
        }
        if self.access_key_id.is_none() {
            self.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        }
        if self.secret_access_key.is_none() {
            self.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        }
        if self.session_token.is_none() {
            self.session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        }
    }

    /// Returns true when both halves of a static key pair are configured.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// What an export reader does when reading its output fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log a warning and return an empty table.
    Empty,
}

/// Execution context of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Staging location for query output, e.g. `s3://bucket/athena/`.
    pub s3_staging_dir: Option<String>,

    /// Default schema (database) of submitted statements.
    pub schema: Option<String>,

    #[serde(default = "default_catalog")]
    pub catalog: String,

    pub work_group: Option<String>,

    /// Interval between status reads while an execution runs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Reuse cached results of identical statements.
    #[serde(default)]
    pub result_reuse: bool,

    #[serde(default = "default_result_reuse_max_age")]
    pub result_reuse_max_age_minutes: i32,

    /// Rows per results page (at most 1000).
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    #[serde(default)]
    pub read_failure: ReadFailurePolicy,
}

fn default_catalog() -> String {
    DEFAULT_CATALOG.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_result_reuse_max_age() -> i32 {
    60
}

fn default_page_size() -> i32 {
    MAX_PAGE_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            s3_staging_dir: None,
            schema: None,
            catalog: default_catalog(),
            work_group: None,
            poll_interval_ms: default_poll_interval_ms(),
            result_reuse: false,
            result_reuse_max_age_minutes: default_result_reuse_max_age(),
            page_size: default_page_size(),
            read_failure: ReadFailurePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a session config with the given staging location.
    pub fn with_staging_dir(staging_dir: impl Into<String>) -> Self {
        Self {
            s3_staging_dir: Some(staging_dir.into()),
            ..Self::default()
        }
    }

    /// Applies ATHENA_* environment variables as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.s3_staging_dir.is_none() {
            self.s3_staging_dir = std::env::var("ATHENA_S3_STAGING_DIR").ok();
        }
        if self.schema.is_none() {
            self.schema = std::env::var("ATHENA_SCHEMA").ok();
        }
        if self.catalog == DEFAULT_CATALOG {
            if let Ok(catalog) = std::env::var("ATHENA_CATALOG") {
                self.catalog = catalog;
            }
        }
        if self.work_group.is_none() {
            self.work_group = std::env::var("ATHENA_WORK_GROUP").ok();
        }
    }

    /// Returns the validated staging location, always ending with `/`.
    pub fn staging_dir(&self) -> Result<String> {
        let raw = self
            .s3_staging_dir
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AthenaError::config("s3_staging_dir is required"))?;

        S3Location::parse(raw.trim())
            .map_err(|e| AthenaError::config(format!("Invalid s3_staging_dir: {e}")))?;

        let mut dir = raw.trim().to_string();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        Ok(dir)
    }

    /// Returns the schema, or a Programming error naming the operation.
    pub fn require_schema(&self, operation: &str) -> Result<&str> {
        self.schema
            .as_deref()
            .ok_or_else(|| AthenaError::programming(format!("{operation} requires a schema")))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the result reuse configuration when enabled.
    pub fn reuse(&self) -> Option<ResultReuse> {
        self.result_reuse.then_some(ResultReuse {
            enabled: true,
            max_age_minutes: self.result_reuse_max_age_minutes,
        })
    }

    /// Returns the page size clamped to the accepted range.
    pub fn effective_page_size(&self) -> i32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Embedded engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Local database file used by the `*_table_db` operations.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Engine threads; defaults to five per CPU.
    pub threads: Option<usize>,

    /// Parallel bulk-load workers; defaults to min(4, CPUs).
    pub workers: Option<usize>,

    /// Install and load the network filesystem extension before reading
    /// remote files.
    #[serde(default = "default_httpfs")]
    pub httpfs: bool,
}

fn default_database() -> PathBuf {
    PathBuf::from("db.duckdb")
}

fn default_httpfs() -> bool {
    true
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            threads: None,
            workers: None,
            httpfs: default_httpfs(),
        }
    }
}

impl EngineConfig {
    /// Engine settings for reading local files only.
    pub fn local() -> Self {
        Self {
            httpfs: false,
            ..Self::default()
        }
    }

    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| cpu_count() * 5).max(1)
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| cpu_count().min(4)).max(1)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("athena-cursor")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AthenaError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            AthenaError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies environment defaults to every section.
    pub fn apply_env_defaults(&mut self) {
        self.aws.apply_env_defaults();
        self.session.apply_env_defaults();
    }

    /// Checks that the configuration can start a session.
    pub fn validate(&self) -> Result<()> {
        self.session.staging_dir()?;
        if self.aws.access_key_id.is_some() != self.aws.secret_access_key.is_some() {
            return Err(AthenaError::config(
                "access_key_id and secret_access_key must be set together",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[aws]
region = "sa-east-1"

[session]
s3_staging_dir = "s3://my-bucket/athena"
schema = "analytics"
work_group = "primary"
result_reuse = true
read_failure = "empty"

[engine]
database = "/tmp/local.duckdb"
workers = 2
httpfs = false
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.aws.region.as_deref(), Some("sa-east-1"));
        assert_eq!(config.session.schema.as_deref(), Some("analytics"));
        assert_eq!(config.session.catalog, DEFAULT_CATALOG);
        assert_eq!(config.session.read_failure, ReadFailurePolicy::Empty);
        assert_eq!(config.session.staging_dir().unwrap(), "s3://my-bucket/athena/");
        assert_eq!(
            config.session.reuse(),
            Some(ResultReuse {
                enabled: true,
                max_age_minutes: 60
            })
        );
        assert_eq!(config.engine.effective_workers(), 2);
        assert!(!config.engine.httpfs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.session.effective_page_size(), 1000);
        assert_eq!(config.session.reuse(), None);
        assert_eq!(config.session.read_failure, ReadFailurePolicy::Propagate);
        assert_eq!(config.engine.database, PathBuf::from("db.duckdb"));
        assert!(config.engine.httpfs);
        assert!(config.engine.effective_workers() <= 4);
        assert!(config.engine.effective_threads() >= 5);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let session = SessionConfig {
            page_size: 5000,
            ..SessionConfig::default()
        };
        assert_eq!(session.effective_page_size(), 1000);
    }

    #[test]
    fn test_staging_dir_required_and_validated() {
        let missing = SessionConfig::default();
        assert!(missing.staging_dir().unwrap_err().to_string().contains("required"));

        let invalid = SessionConfig::with_staging_dir("bucket/prefix");
        assert!(invalid.staging_dir().is_err());

        let valid = SessionConfig::with_staging_dir("s3://bucket/prefix/");
        assert_eq!(valid.staging_dir().unwrap(), "s3://bucket/prefix/");
    }

    #[test]
    fn test_require_schema() {
        let session = SessionConfig::default();
        let err = session.require_schema("write_arrow").unwrap_err();
        assert_eq!(err.category(), "Programming Error");
    }

    #[test]
    fn test_partial_key_pair_is_rejected() {
        let config = Config {
            aws: AwsConfig {
                access_key_id: Some("AKIA".to_string()),
                ..AwsConfig::default()
            },
            session: SessionConfig::with_staging_dir("s3://bucket/"),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session\n").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        assert!(Config::default_path().ends_with("athena-cursor/config.toml"));
    }
}
