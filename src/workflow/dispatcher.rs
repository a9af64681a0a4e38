//! Triggers the cleanup workflow.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
};

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    Error, Result,
    config::Settings,
    framework::Clock,
    github::{DispatchBody, GitHubClient},
    workflow::{Progress, Update},
};

/// The inputs the cleanup workflow declares.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CleanupInputs {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub region: String,
    /// What the workflow should do, e.g. `analyze` or `delete`.
    pub action: String,
    /// Whether destructive actions are confirmed.
    pub confirm: bool,
    /// Any further workflow inputs.
    pub extra: BTreeMap<String, String>,
}

impl Debug for CleanupInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupInputs")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("action", &self.action)
            .field("confirm", &self.confirm)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CleanupInputs {
    /// Checks that the credentials and region are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first blank input.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("aws_access_key_id", &self.aws_access_key_id),
            ("aws_secret_access_key", &self.aws_secret_access_key),
            ("region", &self.region),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(Error::Config(format!("input {name} must not be empty"))),
            None => Ok(()),
        }
    }

    /// Flattens the inputs into the mapping sent to GitHub. Named inputs win over extra ones.
    pub fn to_inputs(&self) -> BTreeMap<String, String> {
        let mut inputs = self.extra.clone();
        inputs.insert(String::from("aws_access_key_id"), self.aws_access_key_id.clone());
        inputs.insert(String::from("aws_secret_access_key"), self.aws_secret_access_key.clone());
        inputs.insert(String::from("region"), self.region.clone());
        if !self.action.is_empty() {
            inputs.insert(String::from("action"), self.action.clone());
        }
        inputs.insert(String::from("confirm"), self.confirm.to_string());
        inputs
    }
}

/// What is known about a dispatch that GitHub accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// The local time just before the dispatch call.
    pub at: DateTime<Utc>,
    /// The unique marker passed through the correlation input, if any.
    pub marker: Option<String>,
}

/// Sends the `workflow_dispatch` call for `inputs`.
///
/// # Errors
///
/// Returns [`Error::Config`] on blank settings or inputs, or [`Error::Dispatch`] if GitHub rejects the call.
pub async fn dispatch(
    client: &GitHubClient,
    clock: &dyn Clock,
    progress: &dyn Progress,
    settings: &Settings,
    inputs: &CleanupInputs,
) -> Result<Dispatched> {
    settings.validate()?;
    inputs.validate()?;

    let mut body = DispatchBody {
        git_ref: settings.git_ref.clone(),
        inputs: inputs.to_inputs(),
    };
    let marker = settings.correlation_input.as_ref().map(|input| {
        let marker = Uuid::new_v4().to_string();
        body.inputs.insert(input.clone(), marker.clone());
        marker
    });

    let at = clock.now();
    client.dispatch(&settings.workflow, &body).await?;
    info!("dispatched {} with inputs {:?}", settings.workflow, inputs);

    progress.update(&Update::Triggered {
        workflow: settings.workflow.clone(),
        git_ref: settings.git_ref.clone(),
    });
    Ok(Dispatched { at, marker })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{
        FakeTransport, ManualClock, RecordingProgress, cleanup_inputs as inputs, epoch, json_response,
        status_response,
    };

    fn settings() -> Settings {
        Settings {
            owner: String::from("acme"),
            repo: String::from("infra"),
            workflow: String::from("aws-cleanup.yml"),
            ..Settings::default()
        }
    }

    fn client(transport: &Arc<FakeTransport>) -> GitHubClient {
        GitHubClient::new(transport.clone(), "https://api.github.com", "acme", "infra")
    }

    #[tokio::test]
    async fn no_content_triggers() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(status_response(204, ""));
        let progress = RecordingProgress::default();

        let dispatched = dispatch(&client(&transport), &ManualClock::default(), &progress, &settings(), &inputs())
            .await
            .unwrap();

        assert_eq!(dispatched.at, epoch());
        assert_eq!(dispatched.marker, None);
        assert_eq!(
            progress.updates(),
            [Update::Triggered {
                workflow: String::from("aws-cleanup.yml"),
                git_ref: String::from("main"),
            }]
        );
        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["inputs"]["region"], "eu-west-1");
        assert_eq!(body["inputs"]["confirm"], "false");
    }

    #[tokio::test]
    async fn rejection_carries_github_message() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(json_response(422, serde_json::json!({"message": "X"})));
        let progress = RecordingProgress::default();

        let err = dispatch(&client(&transport), &ManualClock::default(), &progress, &settings(), &inputs())
            .await
            .unwrap_err();

        let Error::Dispatch { status, message } = &err else {
            panic!("expected a dispatch failure, got {err:?}");
        };
        assert_eq!(*status, 422);
        assert_eq!(message, "X");
        assert!(err.to_string().contains('X'));
        assert!(progress.updates().is_empty());
    }

    #[tokio::test]
    async fn rejection_without_json_uses_raw_text() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(status_response(502, "Bad Gateway"));

        let err = dispatch(
            &client(&transport),
            &ManualClock::default(),
            &RecordingProgress::default(),
            &settings(),
            &inputs(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Dispatch { status: 502, message } if message == "Bad Gateway"));
    }

    #[tokio::test]
    async fn blank_credentials_never_reach_github() {
        let transport = Arc::new(FakeTransport::default());
        let mut inputs = inputs();
        inputs.aws_secret_access_key = String::new();

        let err = dispatch(
            &client(&transport),
            &ManualClock::default(),
            &RecordingProgress::default(),
            &settings(),
            &inputs,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn injects_correlation_marker() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(status_response(204, ""));
        let settings = Settings {
            correlation_input: Some(String::from("run_marker")),
            ..settings()
        };

        let dispatched = dispatch(
            &client(&transport),
            &ManualClock::default(),
            &RecordingProgress::default(),
            &settings,
            &inputs(),
        )
        .await
        .unwrap();

        let marker = dispatched.marker.unwrap();
        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["inputs"]["run_marker"], marker.as_str());
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", inputs());

        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
