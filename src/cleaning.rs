use crate::error::Result;
use crate::tabular::{
    categorical_column_names, column_f64_values, drop_columns_if_present, drop_duplicate_rows,
    numeric_column_names, quantile_linear,
};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Identifier and raw-date columns that carry no predictive signal.
pub const NON_PREDICTIVE_COLUMNS: [&str; 5] = [
    "EmployeeID",
    "recorddate_key",
    "birthdate_key",
    "orighiredate_key",
    "terminationdate_key",
];

/// Categorical columns with at most this many distinct values are one-hot
/// encoded (first level dropped to avoid collinearity).
pub const ONE_HOT_MAX_CARDINALITY: usize = 20;
/// Categorical columns with distinct-value counts in
/// `(ONE_HOT_MAX_CARDINALITY, LABEL_ENCODE_MAX_CARDINALITY]` are integer
/// label-encoded; anything above is dropped entirely.
pub const LABEL_ENCODE_MAX_CARDINALITY: usize = 50;

/// Full cleaning transform, applied in a fixed order for reproducibility:
/// drop non-predictive columns, impute missing values, drop duplicate rows,
/// trim IQR outliers, z-score normalize numerics, encode categoricals by
/// cardinality tier.
///
/// The output has zero missing values, zero duplicate rows, and only numeric
/// (normalized) or encoded categorical columns. Applying the transform to its
/// own output changes nothing.
pub fn clean(df: DataFrame) -> Result<DataFrame> {
    let df = drop_columns_if_present(df, &NON_PREDICTIVE_COLUMNS)?;
    let df = impute_missing(df)?;
    let df = drop_duplicate_rows(&df)?;
    let df = remove_outliers(df)?;
    let df = normalize_numeric(df)?;
    encode_categoricals(df, ONE_HOT_MAX_CARDINALITY)
}

/// Re-encodes an already-cleaned table into model-ready features: identifiers
/// dropped, numerics re-normalized, high-cardinality categoricals dropped and
/// the remainder one-hot encoded.
pub fn encode_for_modeling(df: DataFrame) -> Result<DataFrame> {
    let df = drop_columns_if_present(df, &NON_PREDICTIVE_COLUMNS)?;
    let df = normalize_numeric(df)?;
    // A single cardinality threshold here: everything kept is one-hot encoded.
    encode_categoricals(df, LABEL_ENCODE_MAX_CARDINALITY)
}

/// Fills missing numeric values with the column median and missing
/// categorical values with the column mode.
pub fn impute_missing(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;

    for name in numeric_column_names(&df) {
        let series = df.column(&name)?;
        if series.null_count() == 0 {
            continue;
        }
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        let median = median_of(ca).unwrap_or(0.0);
        let filled: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(median)).collect();
        df.with_column(Series::new(&name, filled))?;
    }

    for name in categorical_column_names(&df) {
        let series = df.column(&name)?;
        if series.null_count() == 0 {
            continue;
        }
        let ca = series.utf8()?;
        let mode = mode_of(ca).unwrap_or_default();
        let filled: Vec<String> = ca
            .into_iter()
            .map(|v| v.unwrap_or(mode.as_str()).to_string())
            .collect();
        df.with_column(Series::new(&name, filled))?;
    }

    Ok(df)
}

fn median_of(ca: &Float64Chunked) -> Option<f64> {
    let values: Vec<f64> = ca.into_iter().flatten().collect();
    quantile_linear(&values, 0.5)
}

/// Most frequent value; ties resolve to the lexicographically smallest so
/// imputation stays deterministic.
fn mode_of(ca: &Utf8Chunked) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in ca.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(value, _)| value.to_string())
}

/// Removes numeric outliers column by column via the IQR rule: rows with a
/// value outside `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` in any numeric column are
/// dropped. Bounds are recomputed on the surviving rows for each column in
/// turn, so a row can be eliminated by any one column's test.
pub fn remove_outliers(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;

    for name in numeric_column_names(&df) {
        if df.height() == 0 {
            break;
        }
        let values = column_f64_values(&df, &name)?;
        let (Some(q1), Some(q3)) = (
            quantile_linear(&values, 0.25),
            quantile_linear(&values, 0.75),
        ) else {
            continue;
        };
        let iqr = q3 - q1;
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;

        let keep: Vec<bool> = values
            .iter()
            .map(|v| v.is_nan() || (*v >= lower && *v <= upper))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            debug!("Removed {} outlier rows from '{}'", removed, name);
            let mask = BooleanChunked::from_slice("keep", &keep);
            df = df.filter(&mask)?;
        }
    }

    Ok(df)
}

/// Z-score normalizes every numeric column. A column with zero standard
/// deviation collapses to the constant 0 instead of dividing by zero.
pub fn normalize_numeric(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;

    for name in numeric_column_names(&df) {
        let values = column_f64_values(&df, &name)?;
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            continue;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let std = sample_std(&finite, mean);

        let normalized: Vec<f64> = if std == 0.0 || !std.is_finite() {
            vec![0.0; values.len()]
        } else {
            values.iter().map(|v| (v - mean) / std).collect()
        };
        df.with_column(Series::new(&name, normalized))?;
    }

    Ok(df)
}

/// Sample standard deviation (ddof = 1); a single observation yields 0.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Routes every categorical column into exactly one of three treatments by
/// its distinct-value count: at most `one_hot_max` distinct values gets
/// one-hot encoding with the first level dropped, up to
/// `LABEL_ENCODE_MAX_CARDINALITY` gets integer label encoding, and anything
/// above that is dropped entirely.
fn encode_categoricals(df: DataFrame, one_hot_max: usize) -> Result<DataFrame> {
    let mut df = df;

    for name in categorical_column_names(&df) {
        let levels = sorted_levels(df.column(&name)?.utf8()?);
        let cardinality = levels.len();

        if cardinality > LABEL_ENCODE_MAX_CARDINALITY {
            info!("Dropping high-cardinality column '{}' ({} distinct values)", name, cardinality);
            df = df.drop(&name)?;
        } else if cardinality > one_hot_max {
            df = label_encode(df, &name, &levels)?;
        } else {
            df = one_hot_encode(df, &name, &levels)?;
        }
    }

    Ok(df)
}

/// Distinct non-null values in lexicographic order, so encodings are stable
/// across runs regardless of row order.
fn sorted_levels(ca: &Utf8Chunked) -> Vec<String> {
    let mut levels: Vec<String> = ca
        .into_iter()
        .flatten()
        .map(|v| v.to_string())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    levels.sort();
    levels
}

fn label_encode(mut df: DataFrame, name: &str, levels: &[String]) -> Result<DataFrame> {
    let index: HashMap<&str, i64> = levels
        .iter()
        .enumerate()
        .map(|(i, level)| (level.as_str(), i as i64))
        .collect();
    let codes: Vec<i64> = df
        .column(name)?
        .utf8()?
        .into_iter()
        .map(|v| v.and_then(|value| index.get(value).copied()).unwrap_or(-1))
        .collect();
    df.with_column(Series::new(name, codes))?;
    Ok(df)
}

/// One-hot encodes a column, dropping the first (lexicographically smallest)
/// level to avoid collinearity. Dummy columns are named `<column>_<level>`
/// and appended after the existing columns; the original column is removed.
fn one_hot_encode(df: DataFrame, name: &str, levels: &[String]) -> Result<DataFrame> {
    let flags: Vec<Vec<i64>> = {
        let ca = df.column(name)?.utf8()?;
        levels
            .iter()
            .skip(1)
            .map(|level| {
                ca.into_iter()
                    .map(|v| i64::from(v == Some(level.as_str())))
                    .collect()
            })
            .collect()
    };

    let mut df = df.drop(name)?;
    for (level, values) in levels.iter().skip(1).zip(flags) {
        let dummy_name = format!("{name}_{level}");
        df.with_column(Series::new(&dummy_name, values))?;
    }
    Ok(df)
}
