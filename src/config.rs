use crate::error::{PipelineError, Result};
use crate::partition::PartitionPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved configuration for a pipeline run.
///
/// Constructed once at the CLI boundary and passed into every stage, so no
/// stage reads paths from ambient global state or climbs relative directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory for all data artifacts.
    pub data_root: PathBuf,
    /// Directory where serialized models are written.
    pub models_root: PathBuf,
    /// Directory for log files and the data quality report.
    pub logs_root: PathBuf,
    /// Logical source name used as the top-level partition bucket.
    pub source: String,
    /// Kaggle dataset identifier downloaded during ingestion.
    pub dataset_slug: String,
    /// Optional direct CSV URL; when set, ingestion downloads over HTTP
    /// instead of shelling out to the kaggle CLI.
    pub dataset_url: Option<String>,
    /// Partition policy applied by the raw storage stage.
    pub partition_policy: PartitionPolicy,
    /// Git tag applied by the versioning stage.
    pub version_tag: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            models_root: PathBuf::from("models"),
            logs_root: PathBuf::from("logs"),
            source: "kaggle".to_string(),
            dataset_slug: "HRAnalyticRepository/employee-attrition-data".to_string(),
            dataset_url: None,
            partition_policy: PartitionPolicy::Accumulate,
            version_tag: "v1.0".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from the given TOML file, falling back to the
    /// defaults when the file does not exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Validation(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Landing area where ingestion drops downloaded files: `data/raw/<source>`.
    pub fn raw_source_dir(&self) -> PathBuf {
        self.data_root.join("raw").join(&self.source)
    }

    /// Root of the partitioned raw store: `data/stored/raw`.
    pub fn stored_raw_root(&self) -> PathBuf {
        self.data_root.join("stored").join("raw")
    }

    /// Partitioned subtree for this source: `data/stored/raw/<source>`.
    pub fn stored_source_dir(&self) -> PathBuf {
        self.stored_raw_root().join(&self.source)
    }

    /// Directory for processed artifacts: `data/processed`.
    pub fn processed_dir(&self) -> PathBuf {
        self.data_root.join("processed")
    }

    /// Canonical cleaned table: `data/processed/clean_data.csv`.
    pub fn clean_data_path(&self) -> PathBuf {
        self.processed_dir().join("clean_data.csv")
    }

    /// Exploratory plot directory: `data/processed/EDA`.
    pub fn eda_dir(&self) -> PathBuf {
        self.processed_dir().join("EDA")
    }

    /// SQLite database holding the `employee_features` table.
    pub fn feature_db_path(&self) -> PathBuf {
        self.processed_dir().join("employee_attrition_features.db")
    }

    /// JSON document backing the feature metadata registry.
    pub fn feature_store_path(&self) -> PathBuf {
        self.processed_dir().join("feature_store.json")
    }

    /// Serialized winning classifier.
    pub fn model_path(&self) -> PathBuf {
        self.models_root.join("churn_model.pkl")
    }

    /// Latest data quality report, replaced on every validation run.
    pub fn quality_report_path(&self) -> PathBuf {
        self.logs_root.join("data_quality_report.csv")
    }

    /// Content-addressed manifest written by the versioning stage.
    pub fn version_manifest_path(&self) -> PathBuf {
        self.logs_root.join("version_manifest.json")
    }
}
