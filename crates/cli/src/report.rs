//! Plain-text rendering of models, encodings and evaluation results.

use dtsim_trainer::{ConfusionMatrix, DecisionTreeClassifier, EvaluationResult};
use std::fmt::Write as _;

/// One-paragraph summary of a trained tree.
pub fn render_model_summary(model: &DecisionTreeClassifier, hash: &str) -> String {
    format!(
        "Decision tree: depth {}, {} leaves, {} classes, purity {}\nstructure hash: {}\n",
        model.depth(),
        model.leaf_count(),
        model.classes().len(),
        model.purity(),
        hash
    )
}

/// Label/code pairs of one encoded column.
pub fn render_encoding(column: &str, pairs: &[(String, usize)]) -> String {
    let width = pairs.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = format!("Encoding of '{column}':\n");
    for (label, code) in pairs {
        let _ = writeln!(out, "  {label:<width$}  ->  {code}");
    }
    out
}

/// Metrics plus the confusion matrix under a heading.
pub fn render_evaluation(title: &str, result: &EvaluationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  accuracy   {:.4}", result.accuracy);
    let _ = writeln!(out, "  precision  {:.4}", result.precision);
    let _ = writeln!(out, "  f1 score   {:.4}", result.f1_score);
    let _ = writeln!(out, "  confusion matrix (rows: actual, columns: predicted)");
    out.push_str(&render_confusion_matrix(&result.confusion_matrix));
    out
}

pub fn render_confusion_matrix(matrix: &ConfusionMatrix) -> String {
    let labels = matrix.labels();
    let label_width = labels.iter().map(String::len).max().unwrap_or(0);
    let count_width = matrix
        .counts()
        .iter()
        .flatten()
        .map(|c| c.to_string().len())
        .max()
        .unwrap_or(1);
    let cell = label_width.max(count_width);

    let mut out = String::new();
    let _ = write!(out, "    {:label_width$}", "");
    for label in labels {
        let _ = write!(out, "  {label:>cell$}");
    }
    out.push('\n');
    for (label, row) in labels.iter().zip(matrix.counts()) {
        let _ = write!(out, "    {label:<label_width$}");
        for count in row {
            let _ = write!(out, "  {count:>cell$}");
        }
        out.push('\n');
    }
    out
}
