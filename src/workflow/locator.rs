//! Finds the run a dispatch created.
//!
//! GitHub does not return a run identifier from a dispatch, so the runs list is polled until a run created after
//! the dispatch (and carrying the correlation marker, if one was sent) shows up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    Error, Result,
    config::Settings,
    framework::{Clock, PollError, PollPolicy, State, poll},
    github::{GitHubClient, RunFilter, WorkflowRun},
    workflow::{Dispatched, Progress, Update},
};

const DISPATCH_EVENT: &str = "workflow_dispatch";

/// What the dispatched run must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCriteria {
    pub branch: Option<String>,
    /// The exact display name, if known.
    pub name: Option<String>,
    /// A marker the run title must contain.
    pub marker: Option<String>,
    /// Runs created before this instant belong to someone else.
    pub not_before: DateTime<Utc>,
}

impl RunCriteria {
    /// The criteria for the run `dispatched` created.
    ///
    /// GitHub reports `created_at` in whole seconds, so the dispatch time is truncated before `skew` is subtracted.
    pub fn for_dispatch(settings: &Settings, dispatched: &Dispatched) -> Self {
        let truncated = DateTime::from_timestamp(dispatched.at.timestamp(), 0).unwrap_or(dispatched.at);
        let skew = chrono::Duration::from_std(Duration::from_secs(settings.clock_skew_secs)).unwrap_or_default();

        Self {
            branch: Some(settings.git_ref.clone()),
            name: settings.run_name.clone(),
            marker: dispatched.marker.clone(),
            not_before: truncated - skew,
        }
    }

    /// Whether `run` may be the dispatched one.
    pub fn matches(&self, run: &WorkflowRun) -> bool {
        let event_ok = run.event.as_deref().is_none_or(|event| event == DISPATCH_EVENT);
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|name| run.name.as_deref() == Some(name) || run.display_title.as_deref() == Some(name));
        let marker_ok = self.marker.as_deref().is_none_or(|marker| {
            [run.display_title.as_deref(), run.name.as_deref()]
                .into_iter()
                .flatten()
                .any(|title| title.contains(marker))
        });

        event_ok && name_ok && marker_ok && run.created_at >= self.not_before
    }

    /// The most recently created matching run.
    pub fn select<'a>(&self, runs: &'a [WorkflowRun]) -> Option<&'a WorkflowRun> {
        runs.iter()
            .filter(|run| self.matches(run))
            .max_by_key(|run| run.created_at)
    }
}

/// Polls the runs list until a run matching `criteria` appears.
///
/// # Errors
///
/// Returns [`Error::RunNotFound`] once `policy` is exhausted, or the first non-transient request error.
pub async fn locate(
    client: &GitHubClient,
    clock: &dyn Clock,
    progress: &dyn Progress,
    criteria: &RunCriteria,
    policy: &PollPolicy,
) -> Result<WorkflowRun> {
    let filter = RunFilter {
        branch: criteria.branch.clone(),
        event: Some(DISPATCH_EVENT.to_owned()),
        per_page: Some(20),
    };

    let found = poll(clock, policy, |attempt| {
        let filter = &filter;
        async move {
            let runs = match State::from_result(client.list_runs(filter).await) {
                State::Success(runs) => runs,
                State::Retry => return State::Retry,
                State::Stop(err) => return State::Stop(err),
            };

            match criteria.select(&runs) {
                Some(run) => State::Success(run.clone()),
                None => {
                    debug!("no matching run among {} listed", runs.len());
                    progress.update(&Update::Locating {
                        attempt,
                        of: policy.max_attempts,
                    });
                    State::Retry
                }
            }
        }
    })
    .await;

    match found {
        Ok(run) => {
            progress.update(&Update::RunFound {
                run_id: run.id,
                title: run.display_title.clone().or_else(|| run.name.clone()).unwrap_or_default(),
                url: run.html_url.clone(),
            });
            Ok(run)
        }
        Err(PollError::Stopped(err)) => Err(err),
        Err(PollError::Exhausted { attempts, .. }) => Err(Error::RunNotFound { attempts }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        github::TransportError,
        testing::{FakeTransport, ManualClock, RecordingProgress, epoch, json_response, run_json},
    };

    fn runs(runs: Vec<serde_json::Value>) -> crate::github::ApiResponse {
        json_response(200, serde_json::json!({"total_count": runs.len(), "workflow_runs": runs}))
    }

    fn criteria() -> RunCriteria {
        RunCriteria {
            branch: Some(String::from("main")),
            name: Some(String::from("AWS Cleanup")),
            marker: None,
            not_before: epoch(),
        }
    }

    fn client(transport: &Arc<FakeTransport>) -> GitHubClient {
        GitHubClient::new(transport.clone(), "https://api.github.com", "acme", "infra")
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(runs(vec![run_json(1, "Other workflow", "queued", None, epoch())]));
        let progress = RecordingProgress::default();
        let policy = PollPolicy::attempts(Duration::from_secs(5), 6);

        let err = locate(&client(&transport), &ManualClock::default(), &progress, &criteria(), &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RunNotFound { attempts: 6 }));
        assert_eq!(transport.requests().len(), 6);
        assert_eq!(progress.updates().last(), Some(&Update::Locating { attempt: 6, of: 6 }));
    }

    #[tokio::test]
    async fn finds_run_once_listed() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(runs(Vec::new()));
        transport.push(runs(vec![run_json(42, "AWS Cleanup", "queued", None, epoch())]));
        let progress = RecordingProgress::default();
        let policy = PollPolicy::attempts(Duration::from_secs(5), 6);

        let run = locate(&client(&transport), &ManualClock::default(), &progress, &criteria(), &policy)
            .await
            .unwrap();

        assert_eq!(run.id, 42);
        assert_eq!(transport.requests().len(), 2);
        assert!(matches!(progress.updates()[1], Update::RunFound { run_id: 42, .. }));
    }

    #[tokio::test]
    async fn transient_errors_consume_attempts() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_error(TransportError::new("timed out", true));
        transport.push(runs(vec![run_json(42, "AWS Cleanup", "queued", None, epoch())]));
        let policy = PollPolicy::attempts(Duration::from_secs(5), 3);

        let run = locate(
            &client(&transport),
            &ManualClock::default(),
            &RecordingProgress::default(),
            &criteria(),
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(run.id, 42);
    }

    #[tokio::test]
    async fn permanent_errors_abort() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(json_response(401, serde_json::json!({"message": "Bad credentials"})));
        let policy = PollPolicy::attempts(Duration::from_secs(5), 3);

        let err = locate(
            &client(&transport),
            &ManualClock::default(),
            &RecordingProgress::default(),
            &criteria(),
            &policy,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Api { status: 401, .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn ignores_runs_created_before_dispatch() {
        let stale: WorkflowRun =
            serde_json::from_value(run_json(1, "AWS Cleanup", "completed", Some("success"), epoch() - chrono::Duration::seconds(30)))
                .unwrap();
        let fresh: WorkflowRun =
            serde_json::from_value(run_json(2, "AWS Cleanup", "queued", None, epoch() + chrono::Duration::seconds(2))).unwrap();
        let newest: WorkflowRun =
            serde_json::from_value(run_json(3, "AWS Cleanup", "queued", None, epoch() + chrono::Duration::seconds(4))).unwrap();

        let criteria = criteria();
        assert!(!criteria.matches(&stale));
        assert_eq!(criteria.select(&[stale.clone(), fresh.clone()]).map(|run| run.id), Some(2));
        assert_eq!(criteria.select(&[fresh, newest, stale]).map(|run| run.id), Some(3));
    }

    #[test]
    fn marker_must_appear_in_title() {
        let mut run: WorkflowRun = serde_json::from_value(run_json(5, "AWS Cleanup", "queued", None, epoch())).unwrap();
        let criteria = RunCriteria {
            name: None,
            marker: Some(String::from("3f1c")),
            ..criteria()
        };

        assert!(!criteria.matches(&run));
        run.display_title = Some(String::from("AWS Cleanup 3f1c"));
        assert!(criteria.matches(&run));
    }

    #[test]
    fn truncates_dispatch_time() {
        let settings = Settings {
            clock_skew_secs: 2,
            ..Settings::default()
        };
        let dispatched = Dispatched {
            at: epoch() + chrono::Duration::milliseconds(750),
            marker: None,
        };

        let criteria = RunCriteria::for_dispatch(&settings, &dispatched);

        assert_eq!(criteria.not_before, epoch() - chrono::Duration::seconds(2));
    }

    #[test]
    fn default_skew_tolerates_a_fast_local_clock() {
        let dispatched = Dispatched {
            at: epoch() + chrono::Duration::seconds(3),
            marker: None,
        };
        let criteria = RunCriteria::for_dispatch(&Settings::default(), &dispatched);
        let mut run: WorkflowRun =
            serde_json::from_value(run_json(1, "AWS Cleanup", "queued", None, epoch())).unwrap();

        assert!(criteria.matches(&run));
        run.created_at = epoch() - chrono::Duration::seconds(3);
        assert!(!criteria.matches(&run));
    }
}
