//! Decision tree training for uploaded tables
//!
//! Parses tabular uploads, label-encodes categorical columns with a stable
//! sorted order, trains a deterministic CART classifier and scores it with
//! accuracy, weighted precision/F1 and a confusion matrix.

pub mod cart;
pub mod classifier;
pub mod deterministic;
pub mod encoding;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod table;

pub use cart::{PurityMeasure, TreeConfig, TreeNode};
pub use classifier::DecisionTreeClassifier;
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use encoding::{ColumnEncoder, EncodedTable, EncodingTable};
pub use errors::{Result, TrainerError};
pub use metrics::{ConfusionMatrix, EvaluationResult};
pub use pipeline::{class_names, TrainEvaluatePipeline, TrainParams};
pub use table::{Column, ColumnValues, CsvParser, DataTable, TabularParser, DEFAULT_SHEET};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
