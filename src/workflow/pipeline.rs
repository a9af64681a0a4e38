//! Chains the workflow stages of one trigger action: dispatch, locate, wait, resolve, fetch.
//!
//! A [`Session`] runs the stages strictly in order and reports every step through its [`Progress`].

use std::sync::Arc;

use tracing::info;

use crate::{
    Error, Result,
    config::Settings,
    framework::{Clock, TriggerGate},
    github::{Artifact, GitHubClient, WorkflowRun},
    report::ReportEntry,
    workflow::{
        CleanupInputs, Progress, RunCriteria, Update, dispatch, fetch_and_extract_report, fetch_report, locate,
        resolve_artifacts, select_artifact, wait_for_completion,
    },
};

/// The report fetched from a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The artifact the report came from.
    pub artifact: Artifact,
    pub entries: Vec<ReportEntry>,
}

/// The result of a successful action.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub run: WorkflowRun,
    /// Every artifact of the run, for download links.
    pub artifacts: Vec<Artifact>,
    pub report: Report,
}

/// Everything one trigger action needs, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct Session {
    client: GitHubClient,
    clock: Arc<dyn Clock>,
    progress: Arc<dyn Progress>,
    gate: Arc<TriggerGate<String>>,
    settings: Settings,
}

impl Session {
    /// Creates a [`Session`]. Sessions sharing `gate` never run two actions for the same workflow at once.
    pub fn new(
        client: GitHubClient,
        clock: Arc<dyn Clock>,
        progress: Arc<dyn Progress>,
        gate: Arc<TriggerGate<String>>,
        settings: Settings,
    ) -> Self {
        Self {
            client,
            clock,
            progress,
            gate,
            settings,
        }
    }

    /// The client the session talks to GitHub with.
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// The session settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Triggers the workflow with `inputs` and follows it to a rendered report.
    ///
    /// Each stage starts only after the previous one resolved. The first failure is reported as
    /// [`Update::Failed`] and aborts the remaining stages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if an action for the same workflow is in flight, or the error of the failing stage.
    pub async fn run(&self, inputs: &CleanupInputs) -> Result<Outcome> {
        let key = self.settings.trigger_key();
        let Some(_guard) = self.gate.try_acquire(key.clone()) else {
            let err = Error::Busy(key);
            self.progress.update(&Update::Failed(err.to_string()));
            return Err(err);
        };

        let outcome = self.run_stages(inputs).await;
        if let Err(err) = &outcome {
            self.progress.update(&Update::Failed(err.to_string()));
        }
        outcome
    }

    async fn run_stages(&self, inputs: &CleanupInputs) -> Result<Outcome> {
        let clock = self.clock.as_ref();
        let progress = self.progress.as_ref();
        let settings = &self.settings;

        let dispatched = dispatch(&self.client, clock, progress, settings, inputs).await?;

        let criteria = RunCriteria::for_dispatch(settings, &dispatched);
        let located = locate(&self.client, clock, progress, &criteria, &settings.locate_policy()).await?;

        let completed =
            wait_for_completion(&self.client, clock, progress, located.id, &settings.status_policy()).await?;
        let succeeded = completed.into_success()?;

        let artifacts = resolve_artifacts(&self.client, progress, &succeeded).await?;
        let artifact = select_artifact(&artifacts, settings.artifact_name.as_deref())?.clone();
        let entries = match &settings.extract_to {
            Some(dir) => {
                fetch_and_extract_report(&self.client, progress, &artifact, &settings.report_file, dir).await?
            }
            None => fetch_report(&self.client, progress, &artifact, &settings.report_file).await?,
        };

        progress.update(&Update::Rendered {
            entries: entries.len(),
        });
        info!("action on {} finished", self.client.slug());

        Ok(Outcome {
            run: succeeded.0,
            artifacts,
            report: Report { artifact, entries },
        })
    }
}
