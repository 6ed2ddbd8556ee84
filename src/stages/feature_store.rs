use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::registry::{transformed_feature, FeatureRegistry};
use anyhow::Result;
use tracing::{info, warn};

/// Canonical features registered on every run; re-registration upserts.
const CORE_FEATURES: [(&str, &str); 3] = [
    ("age", "Normalized age of the employee"),
    ("length_of_service", "Normalized length of service in years"),
    ("department_name", "Encoded department of the employee"),
];

/// Pipeline stage that maintains the feature metadata registry and spot-checks
/// the relational feature table.
pub struct FeatureStoreStage;

impl PipelineStage for FeatureStoreStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let registry = FeatureRegistry::new(config.feature_store_path(), config.feature_db_path());

        for (name, description) in CORE_FEATURES {
            registry.register(name, transformed_feature(description, &config.version_tag))?;
        }

        let features = registry.list()?;
        info!("{} features registered", features.len());

        // Spot-check the relational store; a database that does not exist yet
        // is reported, not fatal.
        match registry.query("SELECT * FROM employee_features LIMIT 5") {
            Ok(sample) => info!(
                "Sample query returned {} rows x {} columns",
                sample.rows.len(),
                sample.columns.len()
            ),
            Err(PipelineError::NotFound(message)) => warn!("{}", message),
            Err(e) => return Err(e.into()),
        }

        let message = format!(
            "Registry holds {} features at '{}'",
            features.len(),
            config.feature_store_path().display()
        );
        Ok(StageResult::success(features.len(), message))
    }

    fn stage_name(&self) -> &'static str {
        "feature_store"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["transformation"]
    }
}
