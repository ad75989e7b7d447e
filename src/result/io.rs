//! Parquet and CSV encoding of columnar tables.

use std::fs::File;
use std::path::Path;

use arrow::csv::WriterBuilder;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use super::ColumnarTable;
use crate::error::Result;

/// Default CSV delimiter.
pub const CSV_DELIMITER: u8 = b';';

/// Decodes a parquet file held in memory.
pub fn read_parquet_bytes(data: Bytes) -> Result<ColumnarTable> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ColumnarTable::new(schema, batches))
}

/// Decodes a local parquet file.
pub fn read_parquet_file(path: &Path) -> Result<ColumnarTable> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ColumnarTable::new(schema, batches))
}

/// Writes a table as a ZSTD-compressed parquet file.
pub fn write_parquet_file(table: &ColumnarTable, path: &Path) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, table.schema().clone(), Some(props))?;
    for batch in table.batches() {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Writes a table as delimited text.
pub fn write_csv_file(
    table: &ColumnarTable,
    path: &Path,
    delimiter: u8,
    header: bool,
) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .with_delimiter(delimiter)
        .with_header(header)
        .build(file);
    for batch in table.batches() {
        writer.write(batch)?;
    }
    Ok(())
}
