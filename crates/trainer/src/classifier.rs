//! Trained decision tree classifier.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::cart::{CartBuilder, PurityMeasure, TreeConfig, TreeNode};
use crate::errors::{Result, TrainerError};
use crate::table::format_number;

/// A fitted classification tree.
///
/// Class values are the distinct target values seen at training time, in
/// ascending order; node predictions index into them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    feature_names: Vec<String>,
    classes: Vec<f64>,
    nodes: Vec<TreeNode>,
    max_depth: usize,
    purity: PurityMeasure,
    seed: u64,
}

impl DecisionTreeClassifier {
    /// Fit on row-major features `x` and target values `y`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        feature_names: &[String],
        config: TreeConfig,
    ) -> Result<Self> {
        if x.is_empty() {
            return Err(TrainerError::Dataset("cannot train on an empty table".to_string()));
        }
        if let Some(row) = x.iter().find(|row| row.len() != feature_names.len()) {
            return Err(TrainerError::Dataset(format!(
                "expected {} features per row, got {}",
                feature_names.len(),
                row.len()
            )));
        }

        let mut classes = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();

        let targets: Vec<usize> = y
            .iter()
            .map(|v| class_index(&classes, *v).unwrap_or(0))
            .collect();

        let max_depth = config.max_depth;
        let purity = config.purity;
        let seed = config.seed;
        let nodes = CartBuilder::new(x, &targets, classes.len(), config)?.build();

        Ok(Self {
            feature_names: feature_names.to_vec(),
            classes,
            nodes,
            max_depth,
            purity,
            seed,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Known class values, ascending.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn purity(&self) -> PurityMeasure {
        self.purity
    }

    /// Predict the class value of each row.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.feature_names.len() {
                    return Err(TrainerError::Dataset(format!(
                        "expected {} features per row, got {}",
                        self.feature_names.len(),
                        row.len()
                    )));
                }
                Ok(self.predict_row(row))
            })
            .collect()
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        while let Some(split) = self.nodes.get(idx).and_then(|n| n.split.as_ref()) {
            idx = if row[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
        let class = self.nodes.get(idx).map(|n| n.prediction).unwrap_or(0);
        self.classes.get(class).copied().unwrap_or(f64::NAN)
    }

    /// Depth of the tree; a lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        match self.nodes.get(idx).and_then(|n| n.split.as_ref()) {
            Some(split) => 1 + self.node_depth(split.left).max(self.node_depth(split.right)),
            None => 0,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Text rendering of the tree, one line per branch.
    ///
    /// Names missing from `feature_names` or `class_names` fall back to
    /// `feature_{i}` and the class value.
    pub fn render_text(&self, feature_names: &[String], class_names: &[String]) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.render_node(0, 0, feature_names, class_names, &mut out);
        }
        out
    }

    fn render_node(
        &self,
        idx: usize,
        depth: usize,
        feature_names: &[String],
        class_names: &[String],
        out: &mut String,
    ) {
        let node = &self.nodes[idx];
        let indent = "|   ".repeat(depth);
        match &node.split {
            Some(split) => {
                let name = feature_names
                    .get(split.feature)
                    .cloned()
                    .unwrap_or_else(|| format!("feature_{}", split.feature));
                let _ = writeln!(out, "{indent}|--- {name} <= {:.2}", split.threshold);
                self.render_node(split.left, depth + 1, feature_names, class_names, out);
                let _ = writeln!(out, "{indent}|--- {name} >  {:.2}", split.threshold);
                self.render_node(split.right, depth + 1, feature_names, class_names, out);
            }
            None => {
                let class = class_names.get(node.prediction).cloned().unwrap_or_else(|| {
                    self.classes
                        .get(node.prediction)
                        .map(|v| format_number(*v))
                        .unwrap_or_default()
                });
                let weights = node
                    .class_counts
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(
                    out,
                    "{indent}|--- class: {class} (samples = {}, value = [{weights}])",
                    node.samples
                );
            }
        }
    }

    /// Pretty JSON of the full model with object keys sorted.
    pub fn to_canonical_json(&self) -> Result<String> {
        // `Value` objects are BTreeMaps, so the round trip sorts struct fields.
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// BLAKE3 hash of the canonical JSON, hex encoded.
    pub fn structure_hash(&self) -> Result<String> {
        let json = self.to_canonical_json()?;
        Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
    }
}

/// Position of `value` among sorted class values.
pub(crate) fn class_index(classes: &[f64], value: f64) -> Option<usize> {
    classes.binary_search_by(|c| c.total_cmp(&value)).ok()
}
