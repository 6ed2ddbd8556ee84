use crate::config::PipelineConfig;
use anyhow::Result;

/// Common trait for all pipeline stages.
///
/// Stages run synchronously, to completion, and communicate only through the
/// filesystem and the feature database, so each one is an independent unit of
/// work for the external orchestrator.
pub trait PipelineStage {
    /// Execute this stage against the resolved configuration.
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult>;

    /// Get the name of this pipeline stage
    fn stage_name(&self) -> &'static str;

    /// Get the stages that must complete before this one can run
    fn dependencies(&self) -> Vec<&'static str>;
}

/// Result of executing a pipeline stage
#[derive(Debug, Clone)]
pub struct StageResult {
    pub success: bool,
    pub processed_count: usize,
    pub failed_count: usize,
    pub message: String,
    pub metadata: std::collections::HashMap<String, String>,
}

impl StageResult {
    pub fn success(processed: usize, message: String) -> Self {
        Self {
            success: true,
            processed_count: processed,
            failed_count: 0,
            message,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn with_failures(processed: usize, failed: usize, message: String) -> Self {
        Self {
            success: failed == 0,
            processed_count: processed,
            failed_count: failed,
            message,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: String) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

// Re-export all pipeline stages
pub mod feature_store;
pub mod ingestion;
pub mod model_building;
pub mod preparation;
pub mod raw_storage;
pub mod transformation;
pub mod validation;
pub mod versioning;

pub use feature_store::FeatureStoreStage;
pub use ingestion::IngestionStage;
pub use model_building::ModelBuildingStage;
pub use preparation::PreparationStage;
pub use raw_storage::RawStorageStage;
pub use transformation::TransformationStage;
pub use validation::ValidationStage;
pub use versioning::VersioningStage;
