use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod split;

pub use forest::RandomForestClassifier;
pub use logistic::LogisticRegression;
pub use metrics::{evaluate, ModelMetrics};
pub use split::{train_test_split, TrainTestSplit};

/// Column in the processed table that flags a terminated employee.
pub const RAW_LABEL_COLUMN: &str = "STATUS_TERMINATED";
/// Binary target derived from the raw label column.
pub const TARGET_COLUMN: &str = "churn";

/// Fraction of rows held out for evaluation.
pub const TEST_FRACTION: f64 = 0.2;
/// Seed shared by the split and the forest, for reproducible runs.
pub const RANDOM_SEED: u64 = 42;

const LEARNING_RATE: f64 = 0.1;
const MAX_ITERATIONS: usize = 1000;
const N_ESTIMATORS: usize = 100;
const MAX_TREE_DEPTH: usize = 10;

/// The winning classifier, kept as an enum so the serialized artifact stays
/// self-describing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForestClassifier),
}

impl TrainedClassifier {
    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        match self {
            TrainedClassifier::LogisticRegression(model) => model.predict(x),
            TrainedClassifier::RandomForest(model) => model.predict(x),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrainedClassifier::LogisticRegression(_) => "Logistic Regression",
            TrainedClassifier::RandomForest(_) => "Random Forest",
        }
    }
}

/// Serialized training output: the winner plus the evaluation scores of every
/// candidate. Overwritten wholesale on each run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub feature_names: Vec<String>,
    pub candidate_metrics: BTreeMap<String, ModelMetrics>,
    pub trained_at: DateTime<Utc>,
    pub classifier: TrainedClassifier,
}

/// Derives the binary `churn` target from the processed table: the raw label
/// column is renamed, its values preserved. Fails hard when the label column
/// is structurally absent.
pub fn load_training_frame(df: DataFrame) -> Result<DataFrame> {
    if !df.get_column_names().contains(&RAW_LABEL_COLUMN) {
        return Err(PipelineError::Validation(format!(
            "target column '{RAW_LABEL_COLUMN}' not found in the processed dataset"
        )));
    }
    let mut df = df;
    let mut churn = df.column(RAW_LABEL_COLUMN)?.cast(&DataType::Int64)?;
    churn.rename(TARGET_COLUMN);
    df = df.drop(RAW_LABEL_COLUMN)?;
    df.with_column(churn)?;
    Ok(df)
}

/// Splits the training frame into a feature matrix, target vector, and the
/// feature names in matrix column order.
pub fn split_features_and_target(df: &DataFrame) -> Result<(Array2<f64>, Vec<u8>, Vec<String>)> {
    let target = df.column(TARGET_COLUMN)?.cast(&DataType::Int64)?;
    let y: Vec<u8> = target
        .i64()?
        .into_iter()
        .map(|v| u8::from(v == Some(1)))
        .collect();

    let feature_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| *name != TARGET_COLUMN)
        .map(|name| name.to_string())
        .collect();

    let mut casted = Vec::with_capacity(feature_names.len());
    for name in &feature_names {
        casted.push(df.column(name)?.cast(&DataType::Float64)?);
    }
    let features = DataFrame::new(casted)?;
    let x = features.to_ndarray::<Float64Type>(IndexOrder::C)?;

    Ok((x, y, feature_names))
}

/// Trains both candidate classifiers, scores them on the held-out split, and
/// selects the one with the higher F1. An exact tie goes to the random
/// forest.
pub fn train_and_select(
    x: &Array2<f64>,
    y: &[u8],
) -> (TrainedClassifier, BTreeMap<String, ModelMetrics>) {
    let split = train_test_split(x, y, TEST_FRACTION, RANDOM_SEED);

    let mut logistic = LogisticRegression::new(LEARNING_RATE, MAX_ITERATIONS);
    logistic.fit(&split.x_train, &split.y_train);
    let logistic_metrics = evaluate(&split.y_test, &logistic.predict(&split.x_test));

    let mut forest = RandomForestClassifier::new(N_ESTIMATORS, MAX_TREE_DEPTH, RANDOM_SEED);
    forest.fit(&split.x_train, &split.y_train);
    let forest_metrics = evaluate(&split.y_test, &forest.predict(&split.x_test));

    info!(
        "Logistic Regression F1 {:.4}, Random Forest F1 {:.4}",
        logistic_metrics.f1_score, forest_metrics.f1_score
    );

    let mut candidate_metrics = BTreeMap::new();
    candidate_metrics.insert("Logistic Regression".to_string(), logistic_metrics);
    candidate_metrics.insert("Random Forest".to_string(), forest_metrics);

    let winner = if forest_metrics.f1_score >= logistic_metrics.f1_score {
        TrainedClassifier::RandomForest(forest)
    } else {
        TrainedClassifier::LogisticRegression(logistic)
    };

    (winner, candidate_metrics)
}

/// Serializes the artifact, creating the models directory as needed. The
/// previous model is replaced wholesale.
pub fn save_artifact(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(artifact)?)?;
    info!("Model saved to '{}'", path.display());
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
