use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::partition::PartitionWriter;
use anyhow::Result;
use tracing::info;

/// Pipeline stage that organizes landed raw files into source/year/month/day
/// partitions under the stored area.
pub struct RawStorageStage;

impl PipelineStage for RawStorageStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let landing = config.raw_source_dir();
        if !landing.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "raw landing directory '{}' does not exist; run ingestion first",
                landing.display()
            ))
            .into());
        }

        let writer = PartitionWriter::new(
            config.stored_raw_root(),
            &config.source,
            config.partition_policy,
        );
        let summary = writer.write_all(&landing)?;

        let message = format!(
            "Partitioned {} files ({} failed) into '{}' with {:?} policy",
            summary.copied,
            summary.failed,
            config.stored_source_dir().display(),
            config.partition_policy
        );
        info!("{}", message);
        Ok(StageResult::with_failures(summary.copied, summary.failed, message))
    }

    fn stage_name(&self) -> &'static str {
        "raw_storage"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["ingestion"]
    }
}
