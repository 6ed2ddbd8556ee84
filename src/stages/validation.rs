use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::discovery::find_latest_file;
use crate::error::PipelineError;
use crate::quality::{build_report, write_report};
use crate::tabular;
use anyhow::Result;
use tracing::{info, warn};

/// Pipeline stage that validates the newest raw file and replaces the data
/// quality report.
pub struct ValidationStage;

impl PipelineStage for ValidationStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let root = config.raw_source_dir();
        let latest = find_latest_file(&root, ".csv")?.ok_or_else(|| {
            PipelineError::NotFound(format!("no CSV file found under '{}'", root.display()))
        })?;
        info!("Validating the latest file: {}", latest.display());

        let df = tabular::read_csv(&latest)?;
        let report = build_report(&df);
        if let Some(error) = &report.error {
            warn!("Quality report computed partially: {}", error);
        }
        info!(
            "Data quality report: {} rows, {} columns, {} duplicate rows, {} columns with missing values",
            report.total_rows,
            report.total_columns,
            report.duplicate_rows,
            report.missing_values.len()
        );

        let report_path = config.quality_report_path();
        write_report(&report, &report_path)?;
        info!("Data quality report saved to '{}'", report_path.display());

        let message = format!(
            "Validated '{}' ({} rows)",
            latest.display(),
            report.total_rows
        );
        Ok(StageResult::success(1, message)
            .with_metadata("report_path", report_path.display().to_string())
            .with_metadata("validated_file", latest.display().to_string()))
    }

    fn stage_name(&self) -> &'static str {
        "validation"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["raw_storage"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_fresh_report_for_the_newest_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_root: dir.path().join("data"),
            logs_root: dir.path().join("logs"),
            ..PipelineConfig::default()
        };
        let landing = config.raw_source_dir().join("20250201_093000");
        std::fs::create_dir_all(&landing).unwrap();
        std::fs::write(
            landing.join("employees.csv"),
            "EmployeeID,age\n1,30\n2,17\n2,17\n",
        )
        .unwrap();

        let result = ValidationStage.execute(&config).unwrap();
        assert!(result.success);
        assert!(config.quality_report_path().is_file());

        let report = tabular::read_csv(&config.quality_report_path()).unwrap();
        assert_eq!(report.height(), 1);
        assert!(report.get_column_names().contains(&"invalid_age_rows"));
    }

    #[test]
    fn empty_raw_area_aborts_with_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_root: dir.path().join("data"),
            logs_root: dir.path().join("logs"),
            ..PipelineConfig::default()
        };
        std::fs::create_dir_all(config.raw_source_dir()).unwrap();

        let err = ValidationStage.execute(&config).unwrap_err();
        let inner = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(inner, PipelineError::NotFound(_)));
        assert!(!config.quality_report_path().exists());
    }
}
