//! User-visible pipeline steps and the sinks they are reported to.

use std::fmt::{self, Debug, Display};

use tracing::{error, info};

use crate::github::{RunConclusion, RunStatus};

/// A user-visible step of the pipeline.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// GitHub accepted the dispatch.
    Triggered { workflow: String, git_ref: String },
    /// The dispatched run is not listed yet.
    Locating { attempt: u32, of: u32 },
    /// The dispatched run was identified.
    RunFound {
        run_id: u64,
        title: String,
        url: Option<String>,
    },
    /// The run's status on one poll.
    Status {
        status: RunStatus,
        conclusion: Option<RunConclusion>,
    },
    /// The run produced artifacts.
    Artifacts { count: usize },
    /// The report artifact is being downloaded.
    Downloading { artifact: String },
    /// The report was rendered.
    Rendered { entries: usize },
    /// The action was aborted.
    Failed(String),
}

impl Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triggered { workflow, git_ref } => {
                write!(f, "✅ Workflow {workflow} triggered on {git_ref}")
            }
            Self::Locating { attempt, of } => {
                write!(f, "⏳ Waiting for the run to appear ({attempt}/{of})…")
            }
            Self::RunFound { run_id, title, url } => match url {
                Some(url) => write!(f, "🔗 Found run {title} ({run_id}): {url}"),
                None => write!(f, "🔗 Found run {title} ({run_id})"),
            },
            Self::Status {
                status,
                conclusion: Some(conclusion),
            } => write!(f, "🔄 Status: {status}, conclusion: {conclusion}"),
            Self::Status { status, conclusion: None } => write!(f, "🔄 Status: {status}"),
            Self::Artifacts { count: 1 } => f.write_str("📦 1 artifact available"),
            Self::Artifacts { count } => write!(f, "📦 {count} artifacts available"),
            Self::Downloading { artifact } => write!(f, "⬇️ Downloading {artifact}…"),
            Self::Rendered { entries: 0 } => f.write_str("📄 No unused resources found"),
            Self::Rendered { entries } => write!(f, "📄 Report rendered with {entries} entries"),
            Self::Failed(message) => write!(f, "❌ {message}"),
        }
    }
}

/// Receives every [`Update`] of a pipeline action, in order.
pub trait Progress: Send + Sync + Debug {
    /// Called once per update.
    fn update(&self, update: &Update);
}

/// Logs every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
    fn update(&self, update: &Update) {
        match update {
            Update::Failed(_) => error!("{update}"),
            _ => info!("{update}"),
        }
    }
}
