//! The trigger pipeline: dispatch a workflow, find its run, wait for it and fetch its report.

pub mod dispatcher;
pub mod locator;
pub mod pipeline;
pub mod poller;
pub mod resolver;

mod progress;

pub use dispatcher::{CleanupInputs, Dispatched, dispatch};
pub use locator::{RunCriteria, locate};
pub use pipeline::{Outcome, Report, Session};
pub use poller::{CompletedRun, SucceededRun, wait_for_completion};
pub use progress::*;
pub use resolver::{fetch_and_extract_report, fetch_report, resolve_artifacts, select_artifact};
