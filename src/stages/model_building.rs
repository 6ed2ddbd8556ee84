use super::{PipelineStage, StageResult};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::model::{
    load_training_frame, save_artifact, split_features_and_target, train_and_select, ModelArtifact,
};
use crate::tabular;
use anyhow::Result;
use chrono::Utc;
use tracing::info;

/// Pipeline stage that trains the candidate classifiers and serializes the
/// one with the best F1 score.
pub struct ModelBuildingStage;

impl PipelineStage for ModelBuildingStage {
    fn execute(&self, config: &PipelineConfig) -> Result<StageResult> {
        let data_path = config.clean_data_path();
        if !data_path.is_file() {
            return Err(PipelineError::NotFound(format!(
                "processed data file not found at '{}'; run preparation first",
                data_path.display()
            ))
            .into());
        }

        let df = tabular::read_csv(&data_path)?;
        info!("Processed data loaded: {} rows, {} columns", df.height(), df.width());

        let frame = load_training_frame(df)?;
        let (x, y, feature_names) = split_features_and_target(&frame)?;

        let (winner, candidate_metrics) = train_and_select(&x, &y);
        for (name, metrics) in &candidate_metrics {
            info!(
                "{}: accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
                name, metrics.accuracy, metrics.precision, metrics.recall, metrics.f1_score
            );
        }
        info!("Best model selected: {}", winner.name());

        let artifact = ModelArtifact {
            model_name: winner.name().to_string(),
            feature_names,
            candidate_metrics,
            trained_at: Utc::now(),
            classifier: winner,
        };
        let model_path = config.model_path();
        save_artifact(&artifact, &model_path)?;

        let message = format!(
            "Trained on {} rows, selected {} -> '{}'",
            x.nrows(),
            artifact.model_name,
            model_path.display()
        );
        Ok(StageResult::success(x.nrows(), message)
            .with_metadata("model", model_path.display().to_string())
            .with_metadata("model_name", artifact.model_name.clone()))
    }

    fn stage_name(&self) -> &'static str {
        "model_building"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["versioning"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load_artifact;

    #[test]
    fn trains_and_serializes_a_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_root: dir.path().join("data"),
            models_root: dir.path().join("models"),
            ..PipelineConfig::default()
        };
        std::fs::create_dir_all(config.processed_dir()).unwrap();

        let mut csv = String::from("age,length_of_service,STATUS_TERMINATED\n");
        for i in 0..100 {
            let label = i64::from(i % 3 == 0);
            csv.push_str(&format!("{:.2},{:.2},{}\n", (i as f64) / 50.0 - 1.0, (i as f64) / 100.0, label));
        }
        std::fs::write(config.clean_data_path(), csv).unwrap();

        let result = ModelBuildingStage.execute(&config).unwrap();
        assert!(result.success);
        assert_eq!(result.processed_count, 100);
        assert!(config.model_path().is_file());

        let artifact = load_artifact(&config.model_path()).unwrap();
        assert_eq!(artifact.feature_names, vec!["age", "length_of_service"]);
        assert!(artifact.candidate_metrics.contains_key("Random Forest"));
    }

    #[test]
    fn missing_label_column_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_root: dir.path().join("data"),
            models_root: dir.path().join("models"),
            ..PipelineConfig::default()
        };
        std::fs::create_dir_all(config.processed_dir()).unwrap();
        std::fs::write(config.clean_data_path(), "age\n0.5\n-0.5\n").unwrap();

        let err = ModelBuildingStage.execute(&config).unwrap_err();
        let inner = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(inner, PipelineError::Validation(_)));
        assert!(!config.model_path().exists());
    }
}
