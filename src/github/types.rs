use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle status of a workflow run.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Waiting => "waiting",
            Self::Requested => "requested",
            Self::Pending => "pending",
            Self::Unknown => "unknown",
        })
    }
}

/// The terminal conclusion of a completed workflow run.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Neutral,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    #[serde(other)]
    Unknown,
}

impl Display for RunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Neutral => "neutral",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::Unknown => "unknown",
        })
    }
}

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    /// The workflow display name.
    #[serde(default)]
    pub name: Option<String>,
    /// The run title, which carries `run-name` when the workflow defines one.
    #[serde(default)]
    pub display_title: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Display for WorkflowRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.display_title
                .as_deref()
                .or(self.name.as_deref())
                .unwrap_or("unnamed run"),
            self.id
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRuns {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Represents artifacts from GitHub REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifacts {
    pub total_count: u32,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// Represents an artifact from GitHub REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    /// Redirects to a signed URL; requires the same bearer credential.
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
    /// `sha256:<hex>`, when GitHub computed one.
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Artifact {
    /// The size in binary units with two decimals, e.g. `2.00 KB`.
    pub fn human_size(&self) -> String {
        format_size(self.size_in_bytes)
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} at {})",
            self.name, self.id, self.archive_download_url
        )
    }
}

/// Formats a byte count in base 1024 using the largest unit among B, KB, MB, GB and TB that keeps the value at least
/// one.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_in_binary_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_size(2048 * 1024 * 1024 * 1024 * 1024), "2048.00 TB");
    }

    #[test]
    fn decodes_run_with_unknown_status() {
        let run: WorkflowRun = serde_json::from_str(
            r#"{
                "id": 7,
                "name": "AWS Cleanup",
                "status": "something_new",
                "conclusion": null,
                "created_at": "2026-10-16T08:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(run.status, RunStatus::Unknown);
        assert_eq!(run.conclusion, None);
        assert_eq!(run.to_string(), "AWS Cleanup (7)");
    }
}
