//! Bagged ensemble of regression trees
//!
//! Each tree is a CART regressor grown on a bootstrap resample of the
//! training rows, splitting on the threshold that minimises squared error.
//! The ensemble prediction is the mean over trees; the spread of the
//! per-tree predictions is the model's disagreement signal.

use crate::error::{EstimationError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Minimum gap between adjacent feature values for a split to be considered
const FEATURE_THRESHOLD: f64 = 1e-7;

/// Target variance below which a node is treated as pure
const IMPURITY_EPSILON: f64 = 1e-12;

/// Ensemble hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a flat node arena (root at index 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    proxy: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    config: &'a ForestConfig,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let value = mean(samples.iter().map(|&i| self.targets[i]));
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        if depth >= self.config.max_depth
            || samples.len() < self.config.min_samples_split
            || samples.len() < 2 * self.config.min_samples_leaf
            || self.is_pure(&samples, value)
        {
            return node_id;
        }

        let Some(split) = self.best_split(&samples) else {
            return node_id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.rows[i][split.feature] <= split.threshold);

        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn is_pure(&self, samples: &[usize], mean: f64) -> bool {
        let var = samples
            .iter()
            .map(|&i| (self.targets[i] - mean).powi(2))
            .sum::<f64>()
            / samples.len() as f64;
        var <= IMPURITY_EPSILON
    }

    /// Best threshold over all features, maximising the squared-error proxy
    /// `sum_l^2 / n_l + sum_r^2 / n_r`. Features are visited in a random
    /// order so ties are broken by the tree's seed.
    fn best_split(&mut self, samples: &[usize]) -> Option<SplitCandidate> {
        let width = self.rows[samples[0]].len();
        let mut features: Vec<usize> = (0..width).collect();
        features.shuffle(&mut *self.rng);

        let n = samples.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total: f64 = samples.iter().map(|&i| self.targets[i]).sum();
        let mut best: Option<SplitCandidate> = None;

        for feature in features {
            let mut sorted = samples.to_vec();
            sorted.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += self.targets[sorted[k - 1]];
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.rows[sorted[k - 1]][feature];
                let hi = self.rows[sorted[k]][feature];
                if lo + FEATURE_THRESHOLD >= hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let proxy =
                    left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(lo, hi),
                        proxy,
                    });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    /// Grow a tree on `samples` (indices into `rows`, repeats allowed)
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        samples: Vec<usize>,
        config: &ForestConfig,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = TreeBuilder {
            rows,
            targets,
            config,
            rng,
            nodes: Vec::new(),
        };
        builder.build(samples, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural check for trees decoded from an artifact: every child
    /// index points forward inside the arena and every split feature
    /// exists.
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("non-finite leaf value at node {}", idx));
                }
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "split feature {} out of range ({} features)",
                            feature, n_features
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("invalid child index {} at node {}", child, idx));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit `config.n_trees` trees, each on a bootstrap resample drawn from
    /// a generator seeded by `config.seed`.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &ForestConfig) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(EstimationError::InsufficientData {
                required: 1,
                found: rows.len().min(targets.len()),
            });
        }

        let n = rows.len();
        let n_features = rows[0].len();
        let mut master = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.n_trees.max(1))
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(master.gen());
                let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(rows, targets, samples, config, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Prediction of every member tree for one row
    pub fn member_predictions(&self, row: &[f64]) -> Vec<f64> {
        self.trees.iter().map(|t| t.predict(row)).collect()
    }

    /// Ensemble mean
    pub fn predict(&self, row: &[f64]) -> f64 {
        mean(self.member_predictions(row).into_iter())
    }

    /// Ensemble mean and population standard deviation across members
    pub fn predict_with_spread(&self, row: &[f64]) -> (f64, f64) {
        let members = self.member_predictions(row);
        let mu = mean(members.iter().copied());
        let var = members.iter().map(|p| (p - mu).powi(2)).sum::<f64>() / members.len() as f64;
        (mu, var.sqrt())
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        self.trees
            .iter()
            .try_for_each(|t| t.validate(self.n_features))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}
