use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::versioning::{snapshot_manifest, write_manifest, DataVersioning};
use crate::runner::ToolRunner;
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::info;

/// Pipeline stage that snapshots the raw and processed data into the
/// version-control tooling and tags a release.
pub struct VersioningStage {
    runner: Arc<dyn ToolRunner>,
}

impl VersioningStage {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }
}

impl PipelineStage for VersioningStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let versioning = DataVersioning::new(self.runner.as_ref());

        versioning.init_dvc()?;

        let raw = config.data_root.join("raw");
        let processed = config.processed_dir();
        versioning.add_data(&raw)?;
        versioning.add_data(&processed)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        versioning.commit(&format!("Data version update: {timestamp}"))?;
        versioning.tag(&config.version_tag)?;

        let manifest = snapshot_manifest(&[raw, processed])?;
        let manifest_path = config.version_manifest_path();
        write_manifest(&manifest, &manifest_path)?;
        info!(
            "Recorded {} file digests in '{}'",
            manifest.len(),
            manifest_path.display()
        );

        let message = format!(
            "Data versioning complete, tagged {} ({} files in manifest)",
            config.version_tag,
            manifest.len()
        );
        info!("{}", message);
        Ok(StageResult::success(manifest.len(), message))
    }

    fn stage_name(&self) -> &'static str {
        "versioning"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["feature_store"]
    }
}
