use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A reproducible train/test partition of the feature matrix.
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Vec<u8>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<u8>,
}

/// Splits rows into train and test sets by shuffling indices with a seeded
/// RNG, so the same seed always produces the same partition.
pub fn train_test_split(x: &Array2<f64>, y: &[u8], test_fraction: f64, seed: u64) -> TrainTestSplit {
    let rows = x.nrows();
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_count = ((rows as f64) * test_fraction).round() as usize;
    let (test_indices, train_indices) = indices.split_at(test_count.min(rows));

    TrainTestSplit {
        x_train: take_rows(x, train_indices),
        y_train: train_indices.iter().map(|&i| y[i]).collect(),
        x_test: take_rows(x, test_indices),
        y_test: test_indices.iter().map(|&i| y[i]).collect(),
    }
}

fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let cols = x.ncols();
    let mut flat = Vec::with_capacity(indices.len() * cols);
    for &i in indices {
        flat.extend(x.row(i).iter().copied());
    }
    Array2::from_shape_vec((indices.len(), cols), flat)
        .expect("row selection preserves the column count")
}
