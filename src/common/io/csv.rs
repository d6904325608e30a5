use std::{io::Cursor, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::{SerReader, SerWriter}, prelude::{CsvReadOptions, CsvReader, CsvWriter, DataType}};

/// Reads a CSV file from `path` into a Polars DataFrame with every column typed as String.
/// Identifier columns keep their leading zeros; numeric columns are cast by the caller.
pub(crate) fn read_csv_file(path: &Path) -> Result<DataFrame> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::csv] Failed to open CSV file: {}", path.display()))?;
    read_csv_bytes(&bytes)
        .with_context(|| format!("[io::csv] Failed to read CSV from {}", path.display()))
}

/// Read DataFrame from CSV bytes, every column typed as String.
pub(crate) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0));

    CsvReader::new(Cursor::new(bytes))
        .with_options(options)
        .finish()
        .context("[io::csv] Failed to parse CSV bytes")
}

/// Write a DataFrame to a CSV file.
pub(crate) fn write_csv_file(path: &Path, df: &DataFrame) -> Result<()> {
    std::fs::write(path, write_csv_bytes(df)?)
        .with_context(|| format!("[io::csv] Failed to write CSV to {}", path.display()))
}

/// Write a DataFrame to CSV bytes.
pub(crate) fn write_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df.clone())
        .context("[io::csv] Failed to write CSV to bytes")?;
    Ok(out)
}

/// Extract a required column as owned strings. Nulls become empty strings.
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let col = df.column(name)
        .with_context(|| format!("[io::csv] missing required column {name:?}"))?
        .cast(&DataType::String)?;

    Ok(col.str()?.into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

/// Extract a required column as floats. Nulls and unparsable values become `None`.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name)
        .with_context(|| format!("[io::csv] missing required column {name:?}"))?
        .cast(&DataType::Float64)?;

    Ok(col.f64()?.into_iter().collect())
}
