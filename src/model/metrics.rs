use serde::{Deserialize, Serialize};

/// Classification metrics on the held-out split. Undefined ratios
/// (zero-division) evaluate to 0 rather than NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Scores binary predictions against ground truth.
pub fn evaluate(y_true: &[u8], y_pred: &[u8]) -> ModelMetrics {
    let mut true_positives = 0usize;
    let mut true_negatives = 0usize;
    let mut false_positives = 0usize;
    let mut false_negatives = 0usize;

    for (&truth, &pred) in y_true.iter().zip(y_pred.iter()) {
        match (truth, pred) {
            (1, 1) => true_positives += 1,
            (0, 0) => true_negatives += 1,
            (0, 1) => false_positives += 1,
            _ => false_negatives += 1,
        }
    }

    let total = y_true.len().min(y_pred.len());
    let accuracy = ratio(true_positives + true_negatives, total);
    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f1_score = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ModelMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
