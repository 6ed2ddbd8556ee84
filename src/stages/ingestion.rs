use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::runner::{run_checked, ToolRunner};
use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Pipeline stage that fetches the external dataset into a timestamped
/// landing folder under the raw area.
pub struct IngestionStage {
    runner: Arc<dyn ToolRunner>,
}

impl IngestionStage {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    fn download_via_http(&self, url: &str, dest_folder: &Path) -> Result<String> {
        let response = reqwest::blocking::get(url)?;
        let bytes = response.bytes()?;

        let filename = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("dataset.csv");
        let target = dest_folder.join(filename);
        fs::write(&target, &bytes)?;
        Ok(target.display().to_string())
    }

    fn download_via_kaggle(&self, slug: &str, dest_folder: &Path) -> Result<()> {
        let dest = dest_folder.to_string_lossy();
        run_checked(
            self.runner.as_ref(),
            "kaggle",
            &["datasets", "download", "-d", slug, "-p", dest.as_ref(), "--unzip"],
        )?;
        Ok(())
    }
}

impl PipelineStage for IngestionStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        // Each run lands in its own capture-stamped subfolder, so the raw
        // area keeps every capture and partitioning can recover the stamp.
        let capture_stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let dest_folder = config.raw_source_dir().join(&capture_stamp);
        fs::create_dir_all(&dest_folder)?;

        let message = match &config.dataset_url {
            Some(url) => {
                info!("Starting direct download from {}", url);
                let target = self.download_via_http(url, &dest_folder)?;
                format!("Downloaded dataset to {target}")
            }
            None => {
                info!("Starting download for dataset: {}", config.dataset_slug);
                self.download_via_kaggle(&config.dataset_slug, &dest_folder)?;
                format!(
                    "Downloaded dataset {} to {}",
                    config.dataset_slug,
                    dest_folder.display()
                )
            }
        };

        info!("{}", message);
        Ok(StageResult::success(1, message)
            .with_metadata("landing_dir", dest_folder.display().to_string()))
    }

    fn stage_name(&self) -> &'static str {
        "ingestion"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![] // First stage in the chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as PipelineResult;
    use crate::runner::ToolOutput;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str]) -> PipelineResult<ToolOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(crate::runner::render_command(program, args));
            Ok(ToolOutput { status: 0, stdout: String::new(), stderr: String::new() })
        }
    }

    #[test]
    fn kaggle_download_targets_a_timestamped_landing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_root: dir.path().join("data"),
            ..PipelineConfig::default()
        };

        let runner = Arc::new(RecordingRunner { calls: Mutex::new(Vec::new()) });
        let stage = IngestionStage::new(runner.clone());
        let result = stage.execute(&config).unwrap();

        assert!(result.success);
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("kaggle datasets download -d HRAnalyticRepository/employee-attrition-data -p"));
        assert!(calls[0].ends_with("--unzip"));

        // The landing folder exists and sits under data/raw/kaggle
        let landing = &result.metadata["landing_dir"];
        assert!(landing.contains("raw"));
        assert!(Path::new(landing).is_dir());
    }
}
