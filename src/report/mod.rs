//! The unused-resource report produced by the cleanup workflow, and its renderers.

pub mod archive;
#[cfg(feature = "extract")]
pub mod extract;
pub mod render;
pub mod table;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The file the workflow writes into its artifact.
pub const DEFAULT_REPORT_FILE: &str = "output.json";

/// One unused image and what still references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub ami_id: String,
    /// As reported by AWS, normally RFC 3339.
    pub created_at: String,
    #[serde(default)]
    pub snapshot_ids: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub in_use_by: InUseBy,
}

/// References keeping an image alive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InUseBy {
    #[serde(default)]
    pub ec2_instances: Vec<String>,
    #[serde(default)]
    pub autoscaling_groups: Vec<String>,
}

impl ReportEntry {
    /// Whether nothing references this image.
    pub fn is_unused(&self) -> bool {
        self.in_use_by.ec2_instances.is_empty() && self.in_use_by.autoscaling_groups.is_empty()
    }
}

/// Parses the report file.
///
/// # Errors
///
/// Returns [`Error::ReportFormat`] if `content` is not UTF-8 encoded JSON holding an array of entries.
pub fn parse_report(content: &[u8]) -> Result<Vec<ReportEntry>> {
    serde_json::from_slice(content).map_err(Error::ReportFormat)
}
