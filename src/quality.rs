use crate::error::Result;
use crate::tabular::{self, count_duplicate_rows};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Age values outside this range are flagged by the domain check.
const AGE_RANGE: (f64, f64) = (18.0, 65.0);
/// Column expected to uniquely identify an employee record.
const IDENTIFIER_COLUMN: &str = "EmployeeID";

/// Flat data-quality report computed fresh from the current latest raw file.
///
/// Only the latest report is retained; the validation stage replaces it on
/// every run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Columns with at least one missing value, mapped to their missing count.
    pub missing_values: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    /// Count of out-of-range ages; present only when an `age` column exists.
    pub invalid_age_rows: Option<usize>,
    /// Whether the identifier column is unique; present only when it exists.
    pub employee_id_unique: Option<bool>,
    /// Set when report computation itself failed part-way; earlier fields keep
    /// whatever was computed before the failure.
    pub error: Option<String>,
}

/// Builds the quality report for a table. Never fails: an internal error is
/// downgraded into the report's `error` field so callers always receive a
/// structured (possibly partial) result.
pub fn build_report(df: &DataFrame) -> QualityReport {
    let mut report = QualityReport::default();
    if let Err(e) = fill_report(df, &mut report) {
        report.error = Some(e.to_string());
    }
    report
}

fn fill_report(df: &DataFrame, report: &mut QualityReport) -> Result<()> {
    report.total_rows = df.height();
    report.total_columns = df.width();

    for series in df.get_columns() {
        let missing = series.null_count();
        if missing > 0 {
            report.missing_values.insert(series.name().to_string(), missing);
        }
    }

    report.duplicate_rows = count_duplicate_rows(df)?;

    // Domain checks run only when the expected column is present; absence
    // skips the check rather than failing the report.
    if df.get_column_names().contains(&"age") {
        let ages = tabular::column_f64_values(df, "age")?;
        let invalid = ages
            .iter()
            .filter(|a| !a.is_nan() && (**a < AGE_RANGE.0 || **a > AGE_RANGE.1))
            .count();
        report.invalid_age_rows = Some(invalid);
    }

    if df.get_column_names().contains(&IDENTIFIER_COLUMN) {
        let ids = df.column(IDENTIFIER_COLUMN)?;
        report.employee_id_unique = Some(ids.n_unique()? == df.height());
    }

    Ok(())
}

/// Persists the report as a one-row CSV, replacing any previous report.
/// Optional checks appear as columns only when they were computed.
pub fn write_report(report: &QualityReport, path: &Path) -> Result<()> {
    let missing_json = serde_json::to_string(&report.missing_values)?;

    let mut columns = vec![
        Series::new("total_rows", &[report.total_rows as i64]),
        Series::new("total_columns", &[report.total_columns as i64]),
        Series::new("missing_values", &[missing_json]),
        Series::new("duplicate_rows", &[report.duplicate_rows as i64]),
    ];
    if let Some(invalid) = report.invalid_age_rows {
        columns.push(Series::new("invalid_age_rows", &[invalid as i64]));
    }
    if let Some(unique) = report.employee_id_unique {
        columns.push(Series::new("employee_id_unique", &[unique]));
    }
    if let Some(error) = &report.error {
        columns.push(Series::new("error", &[error.as_str()]));
    }

    let mut frame = DataFrame::new(columns)?;
    tabular::write_csv(&mut frame, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr_frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("EmployeeID", &[1i64, 2, 3, 3]),
            Series::new("age", &[Some(25i64), Some(17), None, Some(70)]),
            Series::new("department_name", &[Some("Sales"), None, None, Some("Sales")]),
        ])
        .unwrap()
    }

    #[test]
    fn reports_shape_missing_and_duplicates() {
        let report = build_report(&hr_frame());
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.total_columns, 3);
        assert_eq!(report.missing_values.get("age"), Some(&1));
        assert_eq!(report.missing_values.get("department_name"), Some(&2));
        assert!(!report.missing_values.contains_key("EmployeeID"));
        assert_eq!(report.duplicate_rows, 0);
        assert!(report.error.is_none());
    }

    #[test]
    fn age_and_identifier_checks_run_when_columns_exist() {
        let report = build_report(&hr_frame());
        // 17 and 70 fall outside the valid range; the null is not counted
        assert_eq!(report.invalid_age_rows, Some(2));
        assert_eq!(report.employee_id_unique, Some(false));
    }

    #[test]
    fn absent_expected_columns_skip_their_checks() {
        let df = DataFrame::new(vec![Series::new("salary", &[100i64, 200])]).unwrap();
        let report = build_report(&df);
        assert_eq!(report.invalid_age_rows, None);
        assert_eq!(report.employee_id_unique, None);
        assert!(report.error.is_none());
    }

    #[test]
    fn report_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/data_quality_report.csv");
        let report = build_report(&hr_frame());
        write_report(&report, &path).unwrap();

        let written = tabular::read_csv(&path).unwrap();
        assert_eq!(written.height(), 1);
        assert!(written.get_column_names().contains(&"duplicate_rows"));
        assert!(written.get_column_names().contains(&"invalid_age_rows"));
        assert!(!written.get_column_names().contains(&"error"));
    }
}
