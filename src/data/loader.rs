//! CSV loading and encoding for tables kept by the blob store

use crate::error::{SvrError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Load a CSV file with a header row
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| SvrError::Storage(format!("failed to read {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    Ok(df)
}

/// Decode CSV bytes into a table
pub fn decode_csv(bytes: Vec<u8>) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| SvrError::Storage(format!("failed to decode CSV: {}", e)))
}

/// Encode a table as CSV bytes with a header row
pub fn encode_csv(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(df)
        .map_err(|e| SvrError::Storage(format!("failed to encode CSV: {}", e)))?;
    Ok(buf)
}

/// Write a table to a CSV file
pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| SvrError::Storage(e.to_string()))
}
