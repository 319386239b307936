//! Delimited-text reading and writing on top of `arrow::csv`.
//!
//! Every column is read as nullable `Utf8`: raw exports are harmonized by
//! name first and typed later, against the combined table.

use std::io::{Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::util::{safe_open_file, write_atomically};
use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Rows per batch while reading; batches are concatenated afterwards
pub const DEFAULT_BATCH_SIZE: usize = 8192;

const TAB: u8 = b'\t';

/// Read a tab-separated file with a header row into a single batch
pub fn read_tsv(path: &Path) -> Result<RecordBatch> {
    log_operation_start("Reading", path);
    let start = Instant::now();

    let file = safe_open_file(path, "reading tab-separated table")?;
    let batch = read_delimited(file, TAB)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Read delimited text with a header row, every column as nullable `Utf8`
pub fn read_delimited<R: Read + Seek>(mut reader: R, delimiter: u8) -> Result<RecordBatch> {
    let format = Format::default()
        .with_header(true)
        .with_delimiter(delimiter);
    let (inferred, _) = format.infer_schema(&mut reader, Some(0))?;
    reader
        .rewind()
        .map_err(|e| PipelineError::io("failed to rewind input", "<reader>", e))?;

    let schema = Arc::new(utf8_schema(&inferred));
    if schema.fields().is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }

    let csv = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(delimiter)
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build(reader)?;

    let batches = csv.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Write a batch as tab-separated text with a header row, atomically
pub fn write_tsv(batch: &RecordBatch, path: &Path) -> Result<()> {
    write_atomically(path, |writer| write_tsv_to(batch, writer))?;
    log::info!("Saved : {} ({} rows)", path.display(), batch.num_rows());
    Ok(())
}

/// Write a batch as tab-separated text to any writer
pub fn write_tsv_to<W: Write>(batch: &RecordBatch, writer: W) -> Result<()> {
    let mut csv = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(TAB)
        .build(writer);
    csv.write(batch)?;
    Ok(())
}

/// Write a batch as tab-separated text into a string
pub fn to_tsv_string(batch: &RecordBatch) -> Result<String> {
    let mut buffer = Vec::new();
    write_tsv_to(batch, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn utf8_schema(inferred: &Schema) -> Schema {
    Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    )
}
