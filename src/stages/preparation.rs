use super::{PipelineStage, StageResult};
use crate::cleaning::clean;
use crate::config::PipelineConfig;
use crate::discovery::find_latest_file;
use crate::eda::render_eda_plots;
use crate::error::PipelineError;
use crate::tabular;
use anyhow::Result;
use tracing::info;

/// Pipeline stage that cleans the newest partitioned raw file into the
/// canonical processed table and renders the exploratory plots.
pub struct PreparationStage;

impl PipelineStage for PreparationStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let root = config.stored_source_dir();
        let latest = find_latest_file(&root, ".csv")?.ok_or_else(|| {
            PipelineError::NotFound(format!("no CSV file found under '{}'", root.display()))
        })?;
        info!("Preparing data from file: {}", latest.display());

        let raw = tabular::read_csv(&latest)?;
        let rows_in = raw.height();
        let mut cleaned = clean(raw)?;
        let rows_out = cleaned.height();

        let clean_path = config.clean_data_path();
        tabular::write_csv(&mut cleaned, &clean_path)?;
        info!("Clean data saved to '{}'", clean_path.display());

        let plots = render_eda_plots(&cleaned, &config.eda_dir())?;

        let message = format!(
            "Cleaned '{}': {} rows in, {} rows out, {} columns, {} plots",
            latest.display(),
            rows_in,
            rows_out,
            cleaned.width(),
            plots.len()
        );
        info!("{}", message);
        Ok(StageResult::success(rows_out, message)
            .with_metadata("clean_data", clean_path.display().to_string()))
    }

    fn stage_name(&self) -> &'static str {
        "preparation"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["validation"]
    }
}
