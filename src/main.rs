//! athena-cursor - run a statement on Amazon Athena and materialize its result.

mod cli;

use anyhow::Context;
use athena_cursor::config::Config;
use athena_cursor::convert::Row;
use athena_cursor::cursor::{Cursor, Executed};
use athena_cursor::error::AthenaError;
use athena_cursor::logging;
use athena_cursor::result::ColumnDescriptor;
use cli::{Cli, OutputFormat};
use std::io::Write;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<AthenaError>() {
            Some(athena) => error!("{}: {:#}", athena.category(), e),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli
        .parse_output_format()
        .map_err(|e| anyhow::anyhow!(e))?;
    let statement = cli.statement()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults();
    cli.apply_overrides(&mut config);

    let mut cursor = Cursor::connect(&config, cli.reader)
        .await
        .context("Failed to set up the session")?;

    if let Some(path) = &cli.parquet {
        cursor.execute(&statement, None).await?;
        cursor.to_parquet(path).await?;
        info!("Wrote {}", path.display());
        return Ok(());
    }
    if let Some(path) = &cli.csv {
        cursor.execute(&statement, None).await?;
        cursor.to_csv(path, Some(cli.delimiter_byte()?), true).await?;
        info!("Wrote {}", path.display());
        return Ok(());
    }

    let rows = match cursor.execute(&statement, None).await? {
        Executed::Status(row) => row.into_iter().collect(),
        Executed::ResultSet => cursor.fetchall().await?,
    };
    let columns = cursor.description().unwrap_or_default();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => write_text(&mut out, columns, &rows)?,
        OutputFormat::Json => write_json(&mut out, columns, &rows)?,
    }
    info!(rows = rows.len(), rowcount = cursor.rowcount(), "Done");
    Ok(())
}

/// Writes rows as an aligned table with a header line.
fn write_text(out: &mut impl Write, columns: &[ColumnDescriptor], rows: &[Row]) -> std::io::Result<()> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    if !columns.is_empty() {
        writeln!(out, "{}", line(columns.iter().map(|c| c.name.as_str()).collect()))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(out, "{}", rule.join("-+-"))?;
    }
    for row in &cells {
        writeln!(out, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}

/// Writes one JSON object per row, keyed by column name.
fn write_json(out: &mut impl Write, columns: &[ColumnDescriptor], rows: &[Row]) -> anyhow::Result<()> {
    for row in rows {
        let object: serde_json::Map<String, serde_json::Value> = columns
            .iter()
            .zip(row)
            .map(|(column, value)| Ok((column.name.clone(), serde_json::to_value(value)?)))
            .collect::<serde_json::Result<_>>()?;
        writeln!(out, "{}", serde_json::Value::Object(object))?;
    }
    Ok(())
}
