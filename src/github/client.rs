use std::{collections::BTreeMap, sync::Arc};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error, info};
use url::Url;

use crate::{
    Error, Result,
    github::{
        ApiRequest, ApiResponse, Artifact, Artifacts, ByteStream, Transport, WorkflowRun,
        types::WorkflowRuns,
    },
};

/// The public GitHub REST API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// The body of a `workflow_dispatch` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchBody {
    /// The branch or tag the workflow runs on.
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub inputs: BTreeMap<String, String>,
}

/// Narrows the runs list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub branch: Option<String>,
    pub event: Option<String>,
    pub per_page: Option<u8>,
}

/// GitHub Actions endpoints of one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    transport: Arc<dyn Transport>,
    api_base: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Creates a [`GitHubClient`] for `owner/repo` behind `api_base`.
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `owner/repo`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn actions_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/actions/{path}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Triggers `workflow` (a file name or numeric id).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`] unless GitHub answers `204 No Content`.
    pub async fn dispatch(&self, workflow: &str, body: &DispatchBody) -> Result<()> {
        let url = self.actions_url(&format!("workflows/{workflow}/dispatches"));
        let payload = serde_json::to_value(body).map_err(|source| Error::Decode {
            url: url.clone(),
            source,
        })?;
        debug!("dispatching {workflow} on {}…", body.git_ref);

        let response = self.transport.send(ApiRequest::post(&url, payload)).await?;
        if response.status == StatusCode::NO_CONTENT {
            info!("dispatched {workflow} on {}", body.git_ref);
            Ok(())
        } else {
            let message = error_message(&response.body);
            error!("failed to dispatch {workflow}: {message}");
            Err(Error::Dispatch {
                status: response.status.as_u16(),
                message,
            })
        }
    }

    /// Lists the most recent workflow runs of the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or GitHub answers with a non-OK status.
    pub async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<WorkflowRun>> {
        let mut params = Vec::new();
        if let Some(branch) = &filter.branch {
            params.push(("branch", branch.clone()));
        }
        if let Some(event) = &filter.event {
            params.push(("event", event.clone()));
        }
        if let Some(per_page) = filter.per_page {
            params.push(("per_page", per_page.to_string()));
        }
        let mut url = Url::parse(&self.actions_url("runs"))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(&params);
        }

        let runs: WorkflowRuns = self.get_json(url.as_str()).await?;
        debug!("listed {} runs", runs.workflow_runs.len());
        Ok(runs.workflow_runs)
    }

    /// Fetches a single run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or GitHub answers with a non-OK status.
    pub async fn get_run(&self, run_id: u64) -> Result<WorkflowRun> {
        self.get_json(&self.actions_url(&format!("runs/{run_id}")))
            .await
    }

    /// Lists the artifacts of a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactFetch`] if GitHub answers with a non-OK status.
    pub async fn list_artifacts(&self, run_id: u64) -> Result<Artifacts> {
        let url = self.actions_url(&format!("runs/{run_id}/artifacts"));
        debug!("fetching artifacts from {url}…");

        let response = self.transport.send(ApiRequest::get(&url)).await?;
        if !response.status.is_success() {
            let message = error_message(&response.body);
            error!("failed to fetch artifacts from {url}: {message}");
            return Err(Error::ArtifactFetch {
                status: response.status.as_u16(),
                message,
            });
        }

        let artifacts: Artifacts = decode(&url, &response)?;
        match artifacts.total_count {
            1 => info!("fetched 1 artifact from {url}"),
            count => info!("fetched {count} artifacts from {url}"),
        }
        Ok(artifacts)
    }

    /// Downloads the archive of an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArtifactExpired`] on `410 Gone` and [`Error::ArtifactFetch`] on any other non-OK status.
    pub async fn download(&self, artifact: &Artifact) -> Result<ByteStream> {
        let download = self
            .transport
            .download(&artifact.archive_download_url)
            .await?;

        match download.status {
            status if status.is_success() => {
                info!("requested download from {}", artifact.archive_download_url);
                Ok(download.stream)
            }
            StatusCode::GONE => {
                error!("failed to request download: artifact expired or removed");
                Err(Error::ArtifactExpired(artifact.name.clone()))
            }
            status => {
                let reason = status.canonical_reason().unwrap_or("unexpected status");
                error!(
                    "failed to request download from {}: {} {reason}",
                    artifact.archive_download_url,
                    status.as_u16()
                );
                Err(Error::ArtifactFetch {
                    status: status.as_u16(),
                    message: reason.to_owned(),
                })
            }
        }
    }

    async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.transport.send(ApiRequest::get(url)).await?;
        if !response.status.is_success() {
            let message = error_message(&response.body);
            error!("request to {url} failed: {message}");
            return Err(Error::Api {
                status: response.status.as_u16(),
                message,
            });
        }
        decode(url, &response)
    }
}

fn decode<T>(url: &str, response: &ApiResponse) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(&response.body).map_err(|source| {
        error!("failed to parse data from {url}: {source}");
        Error::Decode {
            url: url.to_owned(),
            source,
        }
    })
}

/// Extracts the `message` field of a GitHub error body, falling back to the raw text.
pub fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) => message,
        _ => String::from_utf8_lossy(body).trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, json_response, status_response};

    fn client(transport: &Arc<FakeTransport>) -> GitHubClient {
        GitHubClient::new(transport.clone(), DEFAULT_API_BASE, "acme", "infra")
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(error_message(br#"{"message":"X"}"#), "X");
        assert_eq!(error_message(br#"{"documentation_url":"d"}"#), r#"{"documentation_url":"d"}"#);
        assert_eq!(error_message(b"Bad Gateway\n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn dispatch_posts_ref_and_inputs() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(status_response(204, ""));

        let body = DispatchBody {
            git_ref: String::from("main"),
            inputs: BTreeMap::from([(String::from("region"), String::from("eu-west-1"))]),
        };
        client(&transport).dispatch("cleanup.yml", &body).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(
            request.url,
            "https://api.github.com/repos/acme/infra/actions/workflows/cleanup.yml/dispatches"
        );
        assert_eq!(
            request.body,
            Some(serde_json::json!({"ref": "main", "inputs": {"region": "eu-west-1"}}))
        );
    }

    #[tokio::test]
    async fn dispatch_rejects_anything_but_no_content() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(status_response(200, "{}"));

        let body = DispatchBody {
            git_ref: String::from("main"),
            inputs: BTreeMap::new(),
        };
        let err = client(&transport).dispatch("cleanup.yml", &body).await.unwrap_err();

        assert!(matches!(err, Error::Dispatch { status: 200, .. }));
    }

    #[tokio::test]
    async fn list_runs_encodes_filter() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(json_response(200, serde_json::json!({"total_count": 0, "workflow_runs": []})));

        let filter = RunFilter {
            branch: Some(String::from("feature/x")),
            event: Some(String::from("workflow_dispatch")),
            per_page: Some(10),
        };
        let runs = client(&transport).list_runs(&filter).await.unwrap();

        assert!(runs.is_empty());
        assert_eq!(
            transport.requests()[0].url,
            "https://api.github.com/repos/acme/infra/actions/runs?branch=feature%2Fx&event=workflow_dispatch&per_page=10"
        );
    }

    #[tokio::test]
    async fn get_run_surfaces_api_errors() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(json_response(404, serde_json::json!({"message": "Not Found"})));

        let err = client(&transport).get_run(1).await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 404, ref message } if message == "Not Found"));
    }

    #[tokio::test]
    async fn artifact_listing_failure_is_artifact_fetch() {
        let transport = Arc::new(FakeTransport::default());
        transport.push(json_response(500, serde_json::json!({"message": "boom"})));

        let err = client(&transport).list_artifacts(1).await.unwrap_err();

        assert!(matches!(err, Error::ArtifactFetch { status: 500, .. }));
    }

    #[tokio::test]
    async fn gone_download_is_expired() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_download(410, Vec::new());
        let artifact = crate::testing::artifact("report", 10);

        let Err(err) = client(&transport).download(&artifact).await else {
            panic!("expected the download to fail");
        };

        assert!(matches!(err, Error::ArtifactExpired(name) if name == "report"));
    }
}
