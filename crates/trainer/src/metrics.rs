//! Classification metrics.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TrainerError};

/// Counts of (true class, predicted class) pairs.
///
/// Rows are true classes and columns are predicted classes, both in the
/// order of `labels`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    classes: Vec<f64>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Tally `y_true`/`y_pred` against `classes`, named by `labels`.
    ///
    /// Pairs whose values are not in `classes` are ignored.
    pub fn new(classes: Vec<f64>, labels: Vec<String>, y_true: &[f64], y_pred: &[f64]) -> Self {
        let position = |v: f64| classes.iter().position(|c| c.total_cmp(&v).is_eq());
        let mut counts = vec![vec![0usize; classes.len()]; classes.len()];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if let (Some(row), Some(col)) = (position(t), position(p)) {
                counts[row][col] += 1;
            }
        }
        Self {
            labels,
            classes,
            counts,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Count for the given true and predicted labels.
    pub fn get(&self, true_label: &str, predicted_label: &str) -> Option<usize> {
        let row = self.labels.iter().position(|l| l == true_label)?;
        let col = self.labels.iter().position(|l| l == predicted_label)?;
        Some(self.counts[row][col])
    }

    /// Row of counts for one true label.
    pub fn row(&self, true_label: &str) -> Option<&[usize]> {
        let row = self.labels.iter().position(|l| l == true_label)?;
        Some(&self.counts[row])
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Metrics of one evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub precision: f64,
    pub f1_score: f64,
    pub confusion_matrix: ConfusionMatrix,
}

/// Fraction of exact matches.
pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.total_cmp(*p).is_eq())
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Support-weighted precision and F1 over every class present in either
/// input. Classes never predicted contribute zero precision.
pub fn weighted_precision_f1(y_true: &[f64], y_pred: &[f64]) -> Result<(f64, f64)> {
    check_lengths(y_true, y_pred)?;

    let mut labels: Vec<f64> = y_true.iter().chain(y_pred).copied().collect();
    labels.sort_by(f64::total_cmp);
    labels.dedup();

    let mut precision = 0.0;
    let mut f1 = 0.0;
    let total = y_true.len() as f64;

    for label in labels {
        let is = |v: &f64| v.total_cmp(&label).is_eq();
        let support = y_true.iter().filter(|v| is(*v)).count();
        if support == 0 {
            continue;
        }
        let predicted = y_pred.iter().filter(|v| is(*v)).count();
        let true_positive = y_true
            .iter()
            .zip(y_pred)
            .filter(|(t, p)| is(*t) && is(*p))
            .count();

        let p = if predicted == 0 {
            0.0
        } else {
            true_positive as f64 / predicted as f64
        };
        let r = true_positive as f64 / support as f64;
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };

        let weight = support as f64 / total;
        precision += weight * p;
        f1 += weight * f;
    }

    Ok((precision, f1))
}

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(TrainerError::Dataset(format!(
            "{} true values but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(TrainerError::Dataset(
            "cannot evaluate an empty table".to_string(),
        ));
    }
    Ok(())
}
