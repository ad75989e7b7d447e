//! Command-line argument parsing for athena-cursor.
//!
//! Uses clap to parse CLI arguments. Flags override the config file, which
//! overrides environment defaults.

use athena_cursor::config::Config;
use athena_cursor::error::{AthenaError, Result};
use athena_cursor::reader::ReaderKind;
use clap::Parser;
use std::path::PathBuf;

/// Output format for result rows written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table.
    #[default]
    Text,
    /// One JSON object per row.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Runs one statement on Amazon Athena and prints or saves its result.
#[derive(Parser, Debug)]
#[command(name = "athena-cursor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQL statement to run
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Read the statement from a file
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Result reader
    #[arg(short = 'r', long, value_enum, default_value_t = ReaderKind::Rows)]
    pub reader: ReaderKind,

    /// Output format for rows printed to stdout
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Save the result as parquet instead of printing it
    #[arg(long, value_name = "PATH", conflicts_with = "csv")]
    pub parquet: Option<PathBuf>,

    /// Save the result as delimited text instead of printing it
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Field delimiter of --csv output
    #[arg(long, value_name = "CHAR", default_value_t = ';')]
    pub delimiter: char,

    /// S3 location for query output
    #[arg(long, value_name = "URI", env = "ATHENA_S3_STAGING_DIR")]
    pub staging_dir: Option<String>,

    /// Default schema of the statement
    #[arg(short = 's', long, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// Work group to run in
    #[arg(short = 'w', long, value_name = "NAME")]
    pub work_group: Option<String>,

    /// AWS region
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Reuse cached results of identical statements
    #[arg(long)]
    pub reuse: bool,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the statement to run, from the argument or the --file.
    pub fn statement(&self) -> Result<String> {
        let statement = match (&self.query, &self.file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(AthenaError::config(
                    "No statement given. Pass QUERY or --file",
                ))
            }
        };
        if statement.trim().is_empty() {
            return Err(AthenaError::config("The statement is empty"));
        }
        Ok(statement)
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }

    /// Returns the --delimiter as a single byte.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .map_err(|_| AthenaError::config(format!("Delimiter must be ASCII: {}", self.delimiter)))
    }

    /// Applies command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(staging_dir) = &self.staging_dir {
            config.session.s3_staging_dir = Some(staging_dir.clone());
        }
        if let Some(schema) = &self.schema {
            config.session.schema = Some(schema.clone());
        }
        if let Some(work_group) = &self.work_group {
            config.session.work_group = Some(work_group.clone());
        }
        if let Some(region) = &self.region {
            config.aws.region = Some(region.clone());
        }
        if self.reuse {
            config.session.result_reuse = true;
        }
    }
}
