use super::{PipelineStage, StageResult};
use crate::cleaning::encode_for_modeling;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::feature_db::{store_features, FEATURE_TABLE};
use crate::tabular;
use anyhow::Result;
use tracing::info;

/// Pipeline stage that re-encodes the cleaned table into model-ready
/// features and fully replaces the relational feature table.
pub struct TransformationStage;

impl PipelineStage for TransformationStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let clean_path = config.clean_data_path();
        if !clean_path.is_file() {
            return Err(PipelineError::NotFound(format!(
                "clean data file not found at '{}'; run preparation first",
                clean_path.display()
            ))
            .into());
        }

        let cleaned = tabular::read_csv(&clean_path)?;
        info!(
            "Loaded clean data: {} rows, {} columns",
            cleaned.height(),
            cleaned.width()
        );

        let features = encode_for_modeling(cleaned)?;
        let db_path = config.feature_db_path();
        let stored = store_features(&db_path, &features)?;

        let message = format!(
            "Stored {} rows x {} features into table '{}' at '{}'",
            stored,
            features.width(),
            FEATURE_TABLE,
            db_path.display()
        );
        info!("{}", message);
        Ok(StageResult::success(stored, message)
            .with_metadata("feature_db", db_path.display().to_string()))
    }

    fn stage_name(&self) -> &'static str {
        "transformation"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["preparation"]
    }
}
