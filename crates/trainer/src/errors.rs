use thiserror::Error;

/// Errors returned by encoding, training and evaluation.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("label '{label}' in column '{column}' was not seen when the encoder was fitted")]
    UnknownLabel { column: String, label: String },

    #[error("column '{0}' holds text but has no fitted encoder")]
    UnencodedColumn(String),

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("sheet '{0}' not found")]
    UnknownSheet(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;
