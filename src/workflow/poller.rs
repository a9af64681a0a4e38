//! Follows a run until it completes.

use parking_lot::Mutex;

use crate::{
    Error, Result,
    framework::{Clock, PollError, PollPolicy, State, poll},
    github::{GitHubClient, RunConclusion, RunStatus, WorkflowRun},
    workflow::{Progress, Update},
};

/// A run that reached `completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub run: WorkflowRun,
    /// The terminal conclusion; [`RunConclusion::Unknown`] if GitHub reported none.
    pub conclusion: RunConclusion,
}

/// A run that completed successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct SucceededRun(pub WorkflowRun);

impl CompletedRun {
    /// Keeps the run only if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunFailed`] for any other conclusion.
    pub fn into_success(self) -> Result<SucceededRun> {
        match self.conclusion {
            RunConclusion::Success => Ok(SucceededRun(self.run)),
            conclusion => Err(Error::RunFailed {
                run_id: self.run.id,
                conclusion,
            }),
        }
    }
}

/// Polls run `run_id` until its status is `completed`, reporting the status and conclusion on every tick.
///
/// # Errors
///
/// Returns [`Error::RunTimeout`] once `policy` is exhausted, or the first non-transient request error.
pub async fn wait_for_completion(
    client: &GitHubClient,
    clock: &dyn Clock,
    progress: &dyn Progress,
    run_id: u64,
    policy: &PollPolicy,
) -> Result<CompletedRun> {
    let last_status = Mutex::new(RunStatus::Queued);

    let completed = poll(clock, policy, |_| {
        let last_status = &last_status;
        async move {
            let run = match State::from_result(client.get_run(run_id).await) {
                State::Success(run) => run,
                State::Retry => return State::Retry,
                State::Stop(err) => return State::Stop(err),
            };

            *last_status.lock() = run.status;
            progress.update(&Update::Status {
                status: run.status,
                conclusion: run.conclusion,
            });

            match run.status {
                RunStatus::Completed => State::Success(CompletedRun {
                    conclusion: run.conclusion.unwrap_or(RunConclusion::Unknown),
                    run,
                }),
                _ => State::Retry,
            }
        }
    })
    .await;

    match completed {
        Ok(completed) => Ok(completed),
        Err(PollError::Stopped(err)) => Err(err),
        Err(PollError::Exhausted { waited, .. }) => Err(Error::RunTimeout {
            run_id,
            waited,
            last_status: *last_status.lock(),
        }),
    }
}
