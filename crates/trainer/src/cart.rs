//! CART (Classification and Regression Tree) builder
//!
//! Implements deterministic exact-greedy classification tree construction.
//! Candidate thresholds are midpoints between consecutive distinct values,
//! features are visited in a seeded order and ties are broken by
//! [`SplitTieBreaker`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::deterministic::{LcgRng, SplitTieBreaker};
use crate::errors::{Result, TrainerError};

/// Split-quality criterion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurityMeasure {
    #[default]
    Gini,
    Entropy,
}

impl PurityMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurityMeasure::Gini => "gini",
            PurityMeasure::Entropy => "entropy",
        }
    }

    /// Impurity of a node with the given per-class counts.
    pub fn impurity(&self, counts: &[usize]) -> f64 {
        let total: usize = counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        match self {
            PurityMeasure::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / total;
                        p * p
                    })
                    .sum::<f64>()
            }
            PurityMeasure::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / total;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

impl fmt::Display for PurityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurityMeasure {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gini" => Ok(PurityMeasure::Gini),
            "entropy" => Ok(PurityMeasure::Entropy),
            other => Err(TrainerError::InvalidConfig(format!(
                "unknown purity measure '{other}', expected 'entropy' or 'gini'"
            ))),
        }
    }
}

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub purity: PurityMeasure,
    pub seed: u64,
}

/// Internal split of a tree node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSplit {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// Tree node; leaves have no split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub split: Option<NodeSplit>,
    pub impurity: f64,
    pub samples: usize,
    /// Training samples per class index reaching this node.
    pub class_counts: Vec<usize>,
    /// Majority class index.
    pub prediction: usize,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

/// Build a classification tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    targets: &'a [usize],
    class_count: usize,
    feature_order: Vec<usize>,
}

impl<'a> CartBuilder<'a> {
    /// `targets` holds class indices in `0..class_count`.
    pub fn new(
        features: &'a [Vec<f64>],
        targets: &'a [usize],
        class_count: usize,
        config: TreeConfig,
    ) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(TrainerError::Dataset(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= class_count) {
            return Err(TrainerError::Dataset(format!(
                "class index {bad} out of range for {class_count} classes"
            )));
        }

        let feature_count = features.first().map(Vec::len).unwrap_or(0);
        if features.iter().any(|row| row.len() != feature_count) {
            return Err(TrainerError::Dataset(
                "feature rows have differing lengths".to_string(),
            ));
        }

        let mut feature_order: Vec<usize> = (0..feature_count).collect();
        LcgRng::new(config.seed).shuffle(&mut feature_order);

        Ok(Self {
            config,
            features,
            targets,
            class_count,
            feature_order,
        })
    }

    /// Build tree and return nodes; the root is node 0.
    pub fn build(&self) -> Vec<TreeNode> {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.targets.len()).collect();

        self.build_node(&indices, 0, &mut nodes);

        nodes
    }

    /// Recursively build tree nodes
    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<TreeNode>) -> usize {
        let current_idx = nodes.len();
        let class_counts = self.class_counts(indices);
        let impurity = self.config.purity.impurity(&class_counts);
        let prediction = majority_class(&class_counts);

        nodes.push(TreeNode {
            split: None,
            impurity,
            samples: indices.len(),
            class_counts,
            prediction,
        });

        // Check stopping conditions
        if depth >= self.config.max_depth || indices.len() < 2 || impurity <= 0.0 {
            return current_idx;
        }

        let Some(split) = self.find_best_split(indices, impurity) else {
            return current_idx;
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);

        let left = self.build_node(&left_indices, depth + 1, nodes);
        let right = self.build_node(&right_indices, depth + 1, nodes);

        nodes[current_idx].split = Some(NodeSplit {
            feature: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
        });

        current_idx
    }

    /// Find best split using exact-greedy algorithm
    fn find_best_split(&self, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let mut best_split: Option<SplitCandidate> = None;
        let total = indices.len() as f64;

        for (feature_rank, &feature_idx) in self.feature_order.iter().enumerate() {
            let mut pairs: Vec<(f64, usize)> = indices
                .iter()
                .map(|&i| (self.features[i][feature_idx], self.targets[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut left_counts = vec![0usize; self.class_count];
            let mut right_counts = self.class_counts(indices);
            let mut threshold_rank = 0;

            for pos in 0..pairs.len().saturating_sub(1) {
                let (value, class) = pairs[pos];
                left_counts[class] += 1;
                right_counts[class] -= 1;

                let next = pairs[pos + 1].0;
                if value == next {
                    continue;
                }

                let threshold = midpoint(value, next);
                let n_left = (pos + 1) as f64;
                let n_right = total - n_left;
                let child_impurity = (n_left / total) * self.config.purity.impurity(&left_counts)
                    + (n_right / total) * self.config.purity.impurity(&right_counts);
                let gain = parent_impurity - child_impurity;

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_rank, threshold_rank),
                };
                threshold_rank += 1;

                best_split = match best_split {
                    None => Some(candidate),
                    Some(current) => {
                        // Deterministic tie-breaking
                        if gain > current.gain
                            || (gain == current.gain && candidate.tie_breaker < current.tie_breaker)
                        {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
        }

        best_split
    }

    /// Split samples based on threshold
    fn split_samples(
        &self,
        indices: &[usize],
        feature_idx: usize,
        threshold: f64,
    ) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .copied()
            .partition(|&idx| self.features[idx][feature_idx] <= threshold)
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.class_count];
        for &idx in indices {
            counts[self.targets[idx]] += 1;
        }
        counts
    }
}

/// Index of the largest count; ties go to the smallest index.
pub fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    for (idx, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = idx;
        }
    }
    best
}

/// Midpoint of two consecutive values, kept strictly below `high`.
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low / 2.0 + high / 2.0;
    if mid >= high || !mid.is_finite() {
        low
    } else {
        mid
    }
}
