//! Building blocks of the `dtree-sim` command line tool.

pub mod error;
pub mod report;
pub mod run;
pub mod workbench;

pub use error::{Result, WorkbenchError};
pub use run::{run_session, train_and_evaluate, RunOptions, RunOutcome};
pub use workbench::Workbench;
