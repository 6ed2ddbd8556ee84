use churn_pipeline::config::PipelineConfig;
use churn_pipeline::discovery::find_latest_file;
use churn_pipeline::error::PipelineError;
use churn_pipeline::model::load_artifact;
use churn_pipeline::runner::{ToolOutput, ToolRunner};
use churn_pipeline::stages::{
    FeatureStoreStage, ModelBuildingStage, PipelineStage, PreparationStage, RawStorageStage,
    TransformationStage, ValidationStage, VersioningStage,
};
use churn_pipeline::{feature_db, tabular};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Records invocations instead of touching the host system.
struct FakeRunner {
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()) }
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> churn_pipeline::error::Result<ToolOutput> {
        let mut rendered = program.to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        self.calls.lock().unwrap().push(rendered);
        Ok(ToolOutput { status: 0, stdout: String::new(), stderr: String::new() })
    }
}

fn test_config(root: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data_root: root.join("data"),
        models_root: root.join("models"),
        logs_root: root.join("logs"),
        ..PipelineConfig::default()
    }
}

/// A synthetic HR extract with enough rows for every downstream stage.
fn seed_raw_dataset(config: &PipelineConfig) {
    let landing = config.raw_source_dir().join("20250201_093000");
    fs::create_dir_all(&landing).unwrap();

    let mut csv = String::from("EmployeeID,age,length_of_service,department_name,STATUS\n");
    for i in 0..120 {
        let department = ["Sales", "Produce", "Bakery"][i % 3];
        let status = if i % 4 == 0 { "TERMINATED" } else { "ACTIVE" };
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            i + 1,
            22 + (i % 40),
            1 + (i % 15),
            department,
            status
        ));
    }
    fs::write(landing.join("employees.csv"), csv).unwrap();
}

#[test]
fn file_handoff_runs_from_raw_storage_through_model_building() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_raw_dataset(&config);

    RawStorageStage.execute(&config).unwrap();
    ValidationStage.execute(&config).unwrap();
    PreparationStage.execute(&config).unwrap();
    TransformationStage.execute(&config).unwrap();
    FeatureStoreStage.execute(&config).unwrap();

    let runner = Arc::new(FakeRunner::new());
    VersioningStage::new(runner.clone()).execute(&config).unwrap();
    ModelBuildingStage.execute(&config).unwrap();

    // Every handoff artifact landed at its contract path
    assert!(config.stored_source_dir().join("2025/02/01").is_dir());
    assert!(config.quality_report_path().is_file());
    assert!(config.clean_data_path().is_file());
    assert!(config.eda_dir().join("correlation_heatmap.png").is_file());
    assert!(config.feature_db_path().is_file());
    assert!(config.feature_store_path().is_file());
    assert!(config.version_manifest_path().is_file());
    assert!(config.model_path().is_file());

    // The versioning stage drove the external CLIs through the runner
    let calls = runner.calls.lock().unwrap();
    assert!(calls.iter().any(|c| c.starts_with("dvc add")));
    assert!(calls.iter().any(|c| c == "git tag v1.0"));

    // The cleaned table is fully numeric with the encoded label present
    let cleaned = tabular::read_csv(&config.clean_data_path()).unwrap();
    assert!(cleaned.get_column_names().contains(&"STATUS_TERMINATED"));
    assert!(!cleaned.get_column_names().contains(&"EmployeeID"));
    for series in cleaned.get_columns() {
        assert_eq!(series.null_count(), 0);
    }

    // The feature table was fully replaced with the encoded rows
    let count = feature_db::query(
        &config.feature_db_path(),
        "SELECT COUNT(*) FROM employee_features",
    )
    .unwrap();
    assert_eq!(count.rows[0][0], cleaned.height().to_string());

    let artifact = load_artifact(&config.model_path()).unwrap();
    assert!(artifact.feature_names.contains(&"age".to_string()));
    assert!(!artifact.feature_names.contains(&"churn".to_string()));
}

#[test]
fn hundred_row_label_column_becomes_the_churn_target() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(config.processed_dir()).unwrap();

    let mut csv = String::from("age,STATUS_TERMINATED\n");
    let labels: Vec<i64> = (0..100).map(|i| i64::from(i % 5 == 0)).collect();
    for (i, label) in labels.iter().enumerate() {
        csv.push_str(&format!("{:.2},{}\n", (i as f64) / 50.0 - 1.0, label));
    }
    fs::write(config.clean_data_path(), &csv).unwrap();

    let df = tabular::read_csv(&config.clean_data_path()).unwrap();
    let frame = churn_pipeline::model::load_training_frame(df).unwrap();

    assert_eq!(frame.height(), 100);
    assert!(!frame.get_column_names().contains(&"STATUS_TERMINATED"));
    let churn: Vec<i64> = frame
        .column("churn")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(churn, labels);

    ModelBuildingStage.execute(&config).unwrap();
    assert!(config.model_path().is_file());
}

#[test]
fn empty_raw_area_aborts_cleanly_without_partial_artifacts() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(config.raw_source_dir()).unwrap();
    fs::create_dir_all(config.stored_source_dir()).unwrap();

    // The resolver reports not-found rather than failing
    let latest = find_latest_file(&config.raw_source_dir(), ".csv").unwrap();
    assert!(latest.is_none());

    // Validation and preparation abort with a diagnostic
    let err = ValidationStage.execute(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NotFound(_))
    ));

    let err = PreparationStage.execute(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NotFound(_))
    ));

    // No partial outputs appeared
    assert!(!config.quality_report_path().exists());
    assert!(!config.clean_data_path().exists());
}

#[test]
fn rerunning_the_chain_replaces_rather_than_duplicates() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    seed_raw_dataset(&config);

    for _ in 0..2 {
        RawStorageStage.execute(&config).unwrap();
        ValidationStage.execute(&config).unwrap();
        PreparationStage.execute(&config).unwrap();
        TransformationStage.execute(&config).unwrap();
    }

    // Accumulate policy: the same landing file partitions to the same
    // suffixed name, so the bucket holds exactly one copy
    let bucket = config.stored_source_dir().join("2025/02/01");
    assert_eq!(fs::read_dir(&bucket).unwrap().count(), 1);

    // Report and feature table are replaced, not appended
    let report = tabular::read_csv(&config.quality_report_path()).unwrap();
    assert_eq!(report.height(), 1);

    let cleaned = tabular::read_csv(&config.clean_data_path()).unwrap();
    let count = feature_db::query(
        &config.feature_db_path(),
        "SELECT COUNT(*) FROM employee_features",
    )
    .unwrap();
    assert_eq!(count.rows[0][0], cleaned.height().to_string());
}
