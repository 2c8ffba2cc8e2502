//! A user session: stored upload, lifecycle state and the parsed table.

use dtsim_storage::{SessionState, StorageError, StorageSession};
use dtsim_trainer::{DataTable, TabularParser};
use tracing::debug;

use crate::error::Result;

/// Ties a [`StorageSession`] to the parse cache of its current upload.
///
/// The cached table is reused until a new upload marks it stale or a
/// different sheet is requested.
pub struct Workbench<P> {
    session: StorageSession,
    state: SessionState,
    parser: P,
    cached: Option<(String, DataTable)>,
}

impl<P: TabularParser> Workbench<P> {
    pub fn new(session: StorageSession, parser: P) -> Self {
        Self {
            session,
            state: SessionState::default(),
            parser,
            cached: None,
        }
    }

    pub fn session(&self) -> &StorageSession {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Store `payload` as the session's data file, replacing any earlier one.
    pub fn upload(&mut self, payload: &[u8]) -> Result<String> {
        let key = self.session.upload(payload)?;
        self.state = std::mem::take(&mut self.state).on_upload(key.clone());
        Ok(key)
    }

    /// Sheets available in the current upload.
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        let bytes = self.current_bytes()?;
        Ok(self.parser.sheet_names(&bytes)?)
    }

    /// The parsed `sheet` of the current upload, re-fetched when stale.
    pub fn table(&mut self, sheet: &str) -> Result<&DataTable> {
        let cached_sheet = self.cached.as_ref().map(|(name, _)| name.as_str());
        if self.state.needs_parse() || cached_sheet != Some(sheet) {
            let bytes = self.current_bytes()?;
            let table = self.parser.parse(&bytes, sheet)?;
            debug!(
                session = %self.session.session_id(),
                sheet,
                rows = table.len(),
                "parsed upload"
            );
            self.cached = Some((sheet.to_string(), table));
            self.state = std::mem::take(&mut self.state).on_parsed()?;
        }
        match &self.cached {
            Some((_, table)) => Ok(table),
            None => Err(StorageError::NothingUploaded.into()),
        }
    }

    /// Erase the session's namespace and forget the parsed table.
    pub fn teardown(&mut self) -> Result<()> {
        self.session.teardown()?;
        self.state = std::mem::take(&mut self.state).on_teardown();
        self.cached = None;
        Ok(())
    }

    fn current_bytes(&self) -> Result<Vec<u8>> {
        let key = self
            .state
            .current_key()
            .ok_or(StorageError::NothingUploaded)?;
        Ok(self.session.retrieve(key)?)
    }
}
