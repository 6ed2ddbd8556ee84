use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::info;

/// The single relational table holding the model-ready features.
pub const FEATURE_TABLE: &str = "employee_features";

/// Ad-hoc query result: column names plus stringified rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Replaces the feature table with the given DataFrame. The table is dropped
/// and recreated on every run; nothing is appended.
pub fn store_features(db_path: &Path, df: &DataFrame) -> Result<usize> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path)?;

    let column_defs: Vec<String> = df
        .get_columns()
        .iter()
        .map(|s| format!("{} {}", quote_identifier(s.name()), sql_type(s.dtype())))
        .collect();

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({defs});",
        table = FEATURE_TABLE,
        defs = column_defs.join(", ")
    ))?;

    let placeholders: Vec<String> = (1..=df.width()).map(|i| format!("?{i}")).collect();
    let insert_sql = format!(
        "INSERT INTO {} VALUES ({})",
        FEATURE_TABLE,
        placeholders.join(", ")
    );

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for row in 0..df.height() {
            let mut values = Vec::with_capacity(df.width());
            for series in df.get_columns() {
                values.push(sql_value(series.get(row)?));
            }
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    info!(
        "Stored {} rows into table '{}' at '{}'",
        df.height(),
        FEATURE_TABLE,
        db_path.display()
    );
    Ok(df.height())
}

/// Runs an ad-hoc read query against the feature database. Returns a
/// `NotFound` error when the database has not been created yet.
pub fn query(db_path: &Path, sql: &str) -> Result<QueryResult> {
    if !db_path.exists() {
        return Err(PipelineError::NotFound(format!(
            "feature database '{}' does not exist",
            db_path.display()
        )));
    }
    let conn = Connection::open(db_path)?;
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut result = stmt.query([])?;
    while let Some(row) = result.next()? {
        let mut rendered = Vec::with_capacity(column_count);
        for i in 0..column_count {
            rendered.push(render_value(row.get_ref(i)?));
        }
        rows.push(rendered);
    }

    Ok(QueryResult { columns, rows })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64 | DataType::Boolean => "INTEGER",
        DataType::Float32 | DataType::Float64 => "REAL",
        _ => "TEXT",
    }
}

fn sql_value(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Integer(i64::from(b)),
        AnyValue::Int32(v) => Value::Integer(v as i64),
        AnyValue::Int64(v) => Value::Integer(v),
        AnyValue::UInt32(v) => Value::Integer(v as i64),
        AnyValue::UInt64(v) => Value::Integer(v as i64),
        AnyValue::Float32(v) => Value::Real(v as f64),
        AnyValue::Float64(v) => Value::Real(v),
        AnyValue::Utf8(v) => Value::Text(v.to_string()),
        other => Value::Text(format!("{other}")),
    }
}

fn render_value(value: rusqlite::types::ValueRef) -> String {
    match value {
        rusqlite::types::ValueRef::Null => String::new(),
        rusqlite::types::ValueRef::Integer(v) => v.to_string(),
        rusqlite::types::ValueRef::Real(v) => v.to_string(),
        rusqlite::types::ValueRef::Text(v) => String::from_utf8_lossy(v).into_owned(),
        rusqlite::types::ValueRef::Blob(v) => hex::encode(v),
    }
}
