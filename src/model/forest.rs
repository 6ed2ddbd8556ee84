use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MIN_SAMPLES_SPLIT: usize = 2;
const MAX_THRESHOLD_CANDIDATES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        prediction: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> u8 {
        match self {
            TreeNode::Leaf { prediction } => *prediction,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Bagged ensemble of Gini-split decision trees with per-split feature
/// subsampling. Seeded end to end, so training is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<TreeNode>,
    n_estimators: usize,
    max_depth: usize,
    seed: u64,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth,
            seed,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[u8]) {
        self.trees.clear();
        let rows = x.nrows();
        if rows == 0 {
            return;
        }

        for tree_index in 0..self.n_estimators {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree_index as u64));
            // Bootstrap sample of the training rows
            let sample: Vec<usize> = (0..rows).map(|_| rng.gen_range(0..rows)).collect();
            let root = grow_tree(x, y, &sample, 0, self.max_depth, &mut rng);
            self.trees.push(root);
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        x.rows()
            .into_iter()
            .map(|row| {
                let row: Vec<f64> = row.iter().copied().collect();
                let positive_votes = self
                    .trees
                    .iter()
                    .filter(|tree| tree.predict(&row) == 1)
                    .count();
                u8::from(positive_votes * 2 >= self.trees.len().max(1))
            })
            .collect()
    }
}

fn grow_tree(
    x: &Array2<f64>,
    y: &[u8],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> TreeNode {
    let positives = indices.iter().filter(|&&i| y[i] == 1).count();
    let majority = u8::from(positives * 2 >= indices.len().max(1));

    if depth >= max_depth
        || indices.len() < MIN_SAMPLES_SPLIT
        || positives == 0
        || positives == indices.len()
    {
        return TreeNode::Leaf { prediction: majority };
    }

    let Some((feature, threshold)) = best_split(x, y, indices, rng) else {
        return TreeNode::Leaf { prediction: majority };
    };

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[(i, feature)] <= threshold);
    if left_indices.is_empty() || right_indices.is_empty() {
        return TreeNode::Leaf { prediction: majority };
    }

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(grow_tree(x, y, &left_indices, depth + 1, max_depth, rng)),
        right: Box::new(grow_tree(x, y, &right_indices, depth + 1, max_depth, rng)),
    }
}

/// Evaluates a random subset of sqrt(n_features) features and returns the
/// split with the lowest weighted Gini impurity, if any improves on the
/// parent node.
fn best_split(
    x: &Array2<f64>,
    y: &[u8],
    indices: &[usize],
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let n_features = x.ncols();
    if n_features == 0 {
        return None;
    }
    let subset_size = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);
    features.truncate(subset_size);

    let parent_gini = gini(y, indices);
    let mut best: Option<(usize, f64, f64)> = None;

    for &feature in &features {
        for threshold in candidate_thresholds(x, indices, feature) {
            let (mut left, mut right) = (Vec::new(), Vec::new());
            for &i in indices {
                if x[(i, feature)] <= threshold {
                    left.push(i);
                } else {
                    right.push(i);
                }
            }
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let weighted = (left.len() as f64 * gini(y, &left)
                + right.len() as f64 * gini(y, &right))
                / indices.len() as f64;
            if weighted + 1e-12 < parent_gini
                && best.map_or(true, |(_, _, score)| weighted < score)
            {
                best = Some((feature, threshold, weighted));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

/// Midpoints between consecutive distinct values, thinned to a bounded set of
/// candidates for wide continuous columns.
fn candidate_thresholds(x: &Array2<f64>, indices: &[usize], feature: usize) -> Vec<f64> {
    let mut values: Vec<f64> = indices.iter().map(|&i| x[(i, feature)]).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }

    let midpoints: Vec<f64> = values
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect();
    if midpoints.len() <= MAX_THRESHOLD_CANDIDATES {
        return midpoints;
    }
    let step = midpoints.len() as f64 / MAX_THRESHOLD_CANDIDATES as f64;
    (0..MAX_THRESHOLD_CANDIDATES)
        .map(|i| midpoints[(i as f64 * step) as usize])
        .collect()
}

fn gini(y: &[u8], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let positives = indices.iter().filter(|&&i| y[i] == 1).count() as f64;
    let p = positives / indices.len() as f64;
    2.0 * p * (1.0 - p)
}
