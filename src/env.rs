//! Defines the environment variables to use.
//!
//! Every variable is optional: they only provide defaults that the config file and the command line can override.

use crate::static_lazy_lock;

use std::env;

/// Parses an environment variable from [`String`] to something else, wrapping any error in [`anyhow::Error`].
#[macro_export]
macro_rules! parse_env {
    ($key:expr => |$var:ident| $expr:expr) => {
        std::env::var($key)
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|$var| $expr)
    };
    ($key:expr => |$var:ident| $expr:expr; anyhow) => {
        $crate::parse_env!($key => |$var| $expr.map_err(|e| anyhow::anyhow!(e)))
    };
}

pub use crate::parse_env;

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

static_lazy_lock! {
    /// The GitHub token, taken from `GH_TOKEN` and then `GITHUB_TOKEN`.
    pub GITHUB_TOKEN: Option<String> = non_empty("GH_TOKEN").or_else(|| non_empty("GITHUB_TOKEN"));
}

static_lazy_lock! {
    /// The interval between two polling attempts, in seconds.
    pub POLL_INTERVAL_SECS: u64 = parse_env!("POLL_INTERVAL_SECS" => |s| s.parse::<u64>(); anyhow).unwrap_or(5);
}

static_lazy_lock! {
    /// The maximum attempts when looking for a dispatched run.
    pub MAX_ATTEMPTS: u32 = parse_env!("MAX_ATTEMPTS" => |s| s.parse::<u32>(); anyhow).unwrap_or(12);
}

static_lazy_lock! {
    /// The AWS access key id forwarded to the workflow.
    pub AWS_ACCESS_KEY_ID: Option<String> = non_empty("AWS_ACCESS_KEY_ID");
}

static_lazy_lock! {
    /// The AWS secret access key forwarded to the workflow.
    pub AWS_SECRET_ACCESS_KEY: Option<String> = non_empty("AWS_SECRET_ACCESS_KEY");
}

static_lazy_lock! {
    /// The AWS region forwarded to the workflow.
    pub AWS_REGION: Option<String> = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION"));
}
