use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary logistic regression trained with batch gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    max_iter: usize,
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, max_iter: usize) -> Self {
        Self {
            weights: Vec::new(),
            bias: 0.0,
            learning_rate,
            max_iter,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[u8]) {
        let rows = x.nrows();
        let cols = x.ncols();
        self.weights = vec![0.0; cols];
        self.bias = 0.0;
        if rows == 0 {
            return;
        }

        let targets: Array1<f64> = y.iter().map(|&v| f64::from(v)).collect();

        for _ in 0..self.max_iter {
            let mut weight_grad = vec![0.0; cols];
            let mut bias_grad = 0.0;

            for (row, &target) in x.rows().into_iter().zip(targets.iter()) {
                let error = sigmoid(self.raw_score(row.iter())) - target;
                for (grad, feature) in weight_grad.iter_mut().zip(row.iter()) {
                    *grad += error * feature;
                }
                bias_grad += error;
            }

            let scale = self.learning_rate / rows as f64;
            for (weight, grad) in self.weights.iter_mut().zip(&weight_grad) {
                *weight -= scale * grad;
            }
            self.bias -= scale * bias_grad;
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| sigmoid(self.raw_score(row.iter())))
            .collect()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect()
    }

    fn raw_score<'a, I: Iterator<Item = &'a f64>>(&self, features: I) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, f)| w * f)
                .sum::<f64>()
    }
}

fn sigmoid(z: f64) -> f64 {
    // Clamp to keep exp() in range; saturated scores are certain anyway
    let z = z.clamp(-30.0, 30.0);
    1.0 / (1.0 + (-z).exp())
}
