//! Pipeline settings and where they are loaded from.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Error, Result,
    env::{MAX_ATTEMPTS, POLL_INTERVAL_SECS},
    framework::PollPolicy,
    github::DEFAULT_API_BASE,
    report::DEFAULT_REPORT_FILE,
};

/// The repo-local config file name.
pub const LOCAL_CONFIG_FILE: &str = ".cleanup-dispatch.toml";

/// The environment variable naming a config file.
pub const CONFIG_ENV: &str = "CLEANUP_DISPATCH_CONFIG";

/// Default for [`Settings::clock_skew_secs`].
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 5;

/// Which workflow to trigger and how patiently to follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    /// The workflow file name, e.g. `aws-cleanup.yml`.
    pub workflow: String,
    /// The branch or tag to run the workflow on.
    pub git_ref: String,
    /// The expected run display name; any name matches when unset.
    pub run_name: Option<String>,
    /// A workflow input that receives a unique marker, to be echoed in the run name.
    pub correlation_input: Option<String>,
    pub poll_interval_secs: u64,
    /// How many times to list runs before giving up on the dispatched one.
    pub locate_attempts: u32,
    /// How long to wait for the run to complete.
    pub max_wait_secs: u64,
    pub request_timeout_secs: u64,
    /// Tolerated drift between the local clock and GitHub when matching runs.
    ///
    /// Runs created up to this long before the dispatch still match. Raising it tolerates worse clocks but lets an
    /// older run started just before ours be mistaken for it; set [`Settings::correlation_input`] to rule that out.
    /// Zero only matches when the local clock is never ahead of GitHub's.
    pub clock_skew_secs: u64,
    /// The report file inside the artifact.
    pub report_file: String,
    /// The artifact holding the report; the first listed one when unset.
    pub artifact_name: Option<String>,
    /// Also unpack the report artifact here, reading the report from the unpacked copy.
    pub extract_to: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            owner: String::new(),
            repo: String::new(),
            workflow: String::new(),
            git_ref: String::from("main"),
            run_name: None,
            correlation_input: None,
            poll_interval_secs: *POLL_INTERVAL_SECS,
            locate_attempts: *MAX_ATTEMPTS,
            max_wait_secs: 30 * 60,
            request_timeout_secs: 30,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            report_file: DEFAULT_REPORT_FILE.to_owned(),
            artifact_name: None,
            extract_to: None,
        }
    }
}

impl Settings {
    /// Checks that the target workflow is fully named.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first blank or malformed field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_base", &self.api_base),
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("workflow", &self.workflow),
            ("git_ref", &self.git_ref),
            ("report_file", &self.report_file),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::Config(format!("{field} must not be empty")));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config(String::from("poll_interval_secs must be positive")));
        }
        if self.locate_attempts == 0 {
            return Err(Error::Config(String::from("locate_attempts must be positive")));
        }
        Ok(())
    }

    /// `owner/repo/workflow`, identifying the trigger control.
    pub fn trigger_key(&self) -> String {
        format!("{}/{}/{}", self.owner, self.repo, self.workflow)
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// How to poll for the dispatched run.
    pub fn locate_policy(&self) -> PollPolicy {
        PollPolicy::attempts(Duration::from_secs(self.poll_interval_secs), self.locate_attempts)
    }

    /// How to poll the run until completion.
    pub fn status_policy(&self) -> PollPolicy {
        PollPolicy::deadline(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.max_wait_secs),
        )
    }
}

/// Loads settings.
///
/// Priority:
/// 1. `explicit_path` (the `--config` flag)
/// 2. `.cleanup-dispatch.toml` in the working directory
/// 3. `$CLEANUP_DISPATCH_CONFIG`
/// 4. built-in defaults
///
/// # Errors
///
/// Returns an error if the chosen file cannot be read or parsed.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("loading settings from {}…", path.display());
            let contents =
                std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("parsing TOML from {}", path.display()))
        }
        None => Ok(Settings::default()),
    }
}

fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}
