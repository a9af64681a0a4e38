//! The error taxonomy of the pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::github::{RunConclusion, RunStatus, TransportError};

/// A specialized [`Result`](std::result::Result) for the pipeline.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a pipeline action.
///
/// Every variant is recovered at the point of detection and surfaced as a status message; none is retried beyond the
/// bounded polling itself.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A required input is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Another action for the same workflow is still in flight.
    #[error("an action for {0} is already running")]
    Busy(String),

    /// The dispatch endpoint answered with anything but `204 No Content`.
    #[error("failed to trigger workflow: {message} (HTTP {status})")]
    Dispatch {
        /// The HTTP status code.
        status: u16,
        /// The `message` of the JSON error body, or the raw response text.
        message: String,
    },

    /// Polling the runs list was exhausted without finding the dispatched run.
    #[error("dispatched run not found after {attempts} attempts")]
    RunNotFound {
        /// The number of attempts made.
        attempts: u32,
    },

    /// The run did not complete within the wait bound.
    #[error("run {run_id} did not complete within {}s (last status: {last_status})", .waited.as_secs())]
    RunTimeout {
        /// The run identifier.
        run_id: u64,
        /// How long the poller waited.
        waited: Duration,
        /// The last status observed.
        last_status: RunStatus,
    },

    /// The run completed with a conclusion other than `success`.
    #[error("run {run_id} completed with conclusion {conclusion}")]
    RunFailed {
        /// The run identifier.
        run_id: u64,
        /// The terminal conclusion.
        conclusion: RunConclusion,
    },

    /// The run produced no artifacts.
    #[error("no artifacts")]
    NoArtifacts,

    /// No artifact carries the expected name.
    #[error("no artifact named {0}")]
    ArtifactNotFound(String),

    /// The artifact expired or was removed.
    #[error("artifact {0} expired or was removed")]
    ArtifactExpired(String),

    /// Listing or downloading artifacts answered with a non-OK status.
    #[error("failed to fetch artifacts: {message} (HTTP {status})")]
    ArtifactFetch {
        /// The HTTP status code.
        status: u16,
        /// The error message.
        message: String,
    },

    /// The downloaded archive does not match the digest announced by GitHub.
    #[error("artifact {0} is broken: digest mismatch")]
    DigestMismatch(String),

    /// The expected file is absent from the artifact.
    #[error("expected file {0} not found in artifact")]
    MissingReportFile(String),

    /// The report file is not valid JSON.
    #[error("invalid report: {0}")]
    ReportFormat(#[source] serde_json::Error),

    /// The report could not be rendered as HTML.
    #[error("failed to render report: {0}")]
    Render(#[from] tera::Error),

    /// Any other non-OK answer from the GitHub REST API.
    #[error("GitHub API error: {message} (HTTP {status})")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The requested URL.
        url: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The archive could not be read.
    #[error("failed to read archive: {0}")]
    Archive(#[from] async_zip::error::ZipError),

    /// A local I/O operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a polling loop may spend another attempt instead of aborting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(err) if err.transient)
    }
}
