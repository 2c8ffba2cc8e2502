//! Train/evaluate pipeline over encoded tables.
//!
//! Training and every later evaluation share one [`EncodingTable`]; the
//! pipeline never refits encoders.

use crate::cart::{PurityMeasure, TreeConfig};
use crate::classifier::{class_index, DecisionTreeClassifier};
use crate::encoding::{EncodedTable, EncodingTable};
use crate::errors::{Result, TrainerError};
use crate::metrics::{accuracy, weighted_precision_f1, ConfusionMatrix, EvaluationResult};
use crate::table::format_number;

/// Training parameters.
#[derive(Clone, Debug)]
pub struct TrainParams {
    /// Must be positive.
    pub max_depth: i64,
    pub purity: PurityMeasure,
    pub seed: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            max_depth: 2,
            purity: PurityMeasure::Entropy,
            seed: 42,
        }
    }
}

impl TrainParams {
    /// Check the parameters and turn them into a tree configuration.
    pub fn tree_config(&self) -> Result<TreeConfig> {
        if self.max_depth <= 0 {
            return Err(TrainerError::InvalidConfig(format!(
                "max_depth must be positive, got {}",
                self.max_depth
            )));
        }
        let max_depth = usize::try_from(self.max_depth)
            .map_err(|_| TrainerError::InvalidConfig("max_depth out of range".to_string()))?;
        Ok(TreeConfig {
            max_depth,
            purity: self.purity,
            seed: self.seed,
        })
    }
}

/// Trains a classifier and evaluates it on encoded tables.
pub struct TrainEvaluatePipeline {
    params: TrainParams,
}

impl TrainEvaluatePipeline {
    /// Fails with `InvalidConfig` when the parameters are out of range.
    pub fn new(params: TrainParams) -> Result<Self> {
        params.tree_config()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    /// Fit a tree predicting `target` from `features`.
    pub fn train(
        &self,
        data: &EncodedTable,
        features: &[String],
        target: &str,
    ) -> Result<DecisionTreeClassifier> {
        check_features(features, target)?;
        let x = data.feature_matrix(features)?;
        let y = data.column(target)?;

        let config = self.params.tree_config()?;
        tracing::info!(
            rows = data.len(),
            features = features.len(),
            max_depth = config.max_depth,
            purity = %config.purity,
            "training decision tree"
        );
        let classifier = DecisionTreeClassifier::fit(&x, y, features, config)?;
        tracing::debug!(
            depth = classifier.depth(),
            leaves = classifier.leaf_count(),
            "decision tree trained"
        );
        Ok(classifier)
    }

    /// Score `classifier` on `data`.
    ///
    /// The confusion matrix covers every class known from `encodings` (or
    /// from training when the target is numeric) even when absent from this
    /// batch.
    pub fn evaluate(
        &self,
        classifier: &DecisionTreeClassifier,
        data: &EncodedTable,
        features: &[String],
        target: &str,
        encodings: &EncodingTable,
    ) -> Result<EvaluationResult> {
        let x = data.feature_matrix(features)?;
        let y_true = data.column(target)?;
        let y_pred = classifier.predict(&x)?;

        let accuracy = accuracy(y_true, &y_pred)?;
        let (precision, f1_score) = weighted_precision_f1(y_true, &y_pred)?;

        let mut classes = known_classes(classifier, encodings, target);
        let mut unseen: Vec<f64> = y_true
            .iter()
            .copied()
            .filter(|v| class_index(&classes, *v).is_none())
            .collect();
        if !unseen.is_empty() {
            unseen.sort_by(f64::total_cmp);
            unseen.dedup();
            tracing::warn!(
                target = %target,
                count = unseen.len(),
                "evaluation data holds target values unseen during training"
            );
            classes.extend(unseen);
            classes.sort_by(f64::total_cmp);
        }

        let labels = class_names(encodings, target, &classes);
        let confusion_matrix = ConfusionMatrix::new(classes, labels, y_true, &y_pred);

        tracing::info!(rows = data.len(), accuracy, precision, f1_score, "evaluation finished");
        Ok(EvaluationResult {
            accuracy,
            precision,
            f1_score,
            confusion_matrix,
        })
    }
}

/// Display names for the given class values of `target`.
///
/// Encoded targets use the encoder's labels; numeric targets, or codes the
/// encoder does not know, render the value itself.
pub fn class_names(encodings: &EncodingTable, target: &str, classes: &[f64]) -> Vec<String> {
    let encoder = encodings.encoder(target);
    classes
        .iter()
        .map(|&value| {
            encoder
                .filter(|_| value >= 0.0 && value.fract() == 0.0)
                .and_then(|e| e.decode(value as usize))
                .map(str::to_string)
                .unwrap_or_else(|| format_number(value))
        })
        .collect()
}

/// Class values known before looking at an evaluation batch.
fn known_classes(
    classifier: &DecisionTreeClassifier,
    encodings: &EncodingTable,
    target: &str,
) -> Vec<f64> {
    match encodings.encoder(target) {
        Some(encoder) => (0..encoder.len()).map(|code| code as f64).collect(),
        None => classifier.classes().to_vec(),
    }
}

fn check_features(features: &[String], target: &str) -> Result<()> {
    if features.is_empty() {
        return Err(TrainerError::InvalidConfig(
            "at least one feature column is required".to_string(),
        ));
    }
    if features.iter().any(|f| f == target) {
        return Err(TrainerError::InvalidConfig(format!(
            "target column '{target}' cannot also be a feature"
        )));
    }
    Ok(())
}
