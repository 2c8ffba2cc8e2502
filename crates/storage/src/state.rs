//! Upload/parse lifecycle of a session's data file.

use crate::error::{Result, StorageError};

/// Whether the parsed copy of the session data is current.
///
/// ```text
/// Empty --upload--> Uploaded --parsed--> Parsed
///                                           |
///            Parsed <--parsed-- Stale <--upload
/// ```
///
/// Uploading again while `Uploaded` or `Stale` keeps the state; teardown
/// returns to `Empty` from anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing uploaded yet.
    #[default]
    Empty,
    /// Uploaded, never parsed.
    Uploaded { key: String },
    /// Parsed copy matches the latest upload.
    Parsed { key: String },
    /// Parsed copy predates the latest upload.
    Stale { key: String },
}

impl SessionState {
    /// Transition after an upload that stored the data under `key`.
    pub fn on_upload(self, key: String) -> Self {
        match self {
            SessionState::Empty | SessionState::Uploaded { .. } => SessionState::Uploaded { key },
            SessionState::Parsed { .. } | SessionState::Stale { .. } => SessionState::Stale { key },
        }
    }

    /// Transition after the latest upload was parsed.
    pub fn on_parsed(self) -> Result<Self> {
        match self {
            SessionState::Empty => Err(StorageError::NothingUploaded),
            SessionState::Uploaded { key }
            | SessionState::Parsed { key }
            | SessionState::Stale { key } => Ok(SessionState::Parsed { key }),
        }
    }

    /// Transition after the namespace was torn down.
    pub fn on_teardown(self) -> Self {
        SessionState::Empty
    }

    /// The cached parse (if any) no longer reflects the stored data.
    pub fn needs_parse(&self) -> bool {
        matches!(
            self,
            SessionState::Uploaded { .. } | SessionState::Stale { .. }
        )
    }

    /// Key of the most recent upload.
    pub fn current_key(&self) -> Option<&str> {
        match self {
            SessionState::Empty => None,
            SessionState::Uploaded { key }
            | SessionState::Parsed { key }
            | SessionState::Stale { key } => Some(key),
        }
    }
}
