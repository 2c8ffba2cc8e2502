use dtsim_storage::StorageError;
use dtsim_trainer::TrainerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a [`crate::Workbench`] and the run flow built on it.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;
