use crate::error::Result;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Reads a CSV file into a DataFrame with header inference.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReader::from_path(path)?.has_header(true).finish()?;
    Ok(df)
}

/// Writes a DataFrame to a CSV file, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

pub fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Utf8)
}

/// Names of numeric columns, in frame order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| is_numeric_dtype(s.dtype()))
        .map(|s| s.name().to_string())
        .collect()
}

/// Names of categorical (string) columns, in frame order.
pub fn categorical_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| is_categorical_dtype(s.dtype()))
        .map(|s| s.name().to_string())
        .collect()
}

/// Materializes a numeric column as `f64` values with nulls mapped to NaN.
pub fn column_f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let casted = df.column(name)?.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// A stable textual key for each row, used for duplicate detection.
fn row_keys(df: &DataFrame) -> Result<Vec<String>> {
    let columns = df.get_columns();
    let mut keys = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut key = String::new();
        for series in columns {
            let value = series.get(row)?;
            key.push_str(&format!("{value:?}"));
            key.push('\u{1f}');
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Counts rows that are exact duplicates of an earlier row.
pub fn count_duplicate_rows(df: &DataFrame) -> Result<usize> {
    let keys = row_keys(df)?;
    let distinct: HashSet<&String> = keys.iter().collect();
    Ok(keys.len() - distinct.len())
}

/// Drops exact-duplicate rows, keeping the first occurrence of each.
pub fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame> {
    let keys = row_keys(df)?;
    let mut seen: HashSet<String> = HashSet::with_capacity(keys.len());
    let mask: Vec<bool> = keys.into_iter().map(|key| seen.insert(key)).collect();
    let mask = BooleanChunked::from_slice("keep", &mask);
    Ok(df.filter(&mask)?)
}

/// Linear-interpolation quantile over the non-NaN values, matching the
/// interpolation used by the upstream report tooling.
pub fn quantile_linear(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = position - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

/// Drops the named columns when present; absent names are ignored.
pub fn drop_columns_if_present(df: DataFrame, names: &[&str]) -> Result<DataFrame> {
    let mut df = df;
    for name in names {
        if df.get_column_names().contains(name) {
            df = df.drop(name)?;
        }
    }
    Ok(df)
}
