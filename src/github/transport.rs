//! The HTTP seam between the pipeline and GitHub REST API.

use std::{
    fmt::{self, Debug},
    time::Duration,
};

use async_trait::async_trait;
use futures::{StreamExt as _, TryStreamExt as _, stream::BoxStream};
use reqwest::{Method, RequestBuilder, StatusCode, header};
use thiserror::Error;
use tokio_util::bytes::Bytes;
use tracing::debug;

/// A stream of downloaded bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// A request to GitHub REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    /// A `POST` request with a JSON body.
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// A streamed response.
pub struct Download {
    pub status: StatusCode,
    pub stream: ByteStream,
}

impl Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// Connection failures and timeouts; worth another polling attempt.
    pub transient: bool,
}

impl TransportError {
    /// Creates a [`TransportError`].
    pub fn new(message: impl Into<String>, transient: bool) -> Self {
        Self {
            message: message.into(),
            transient,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            transient: err.is_connect() || err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Sends authenticated requests to GitHub REST API.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends a request and buffers the whole response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;

    /// Requests `url` and streams the response body.
    async fn download(&self, url: &str) -> Result<Download, TransportError>;
}

/// A [`Transport`] over [`reqwest`].
pub struct HttpTransport {
    client: reqwest::Client,
    token: String,
}

impl Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates an [`HttpTransport`] authenticating with `token`, failing every call that takes longer than `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank or the TLS backend cannot be initialized.
    pub fn new(token: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(crate::Error::Config(String::from("GitHub token is empty")));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("cleanup-dispatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(TransportError::from)?;

        Ok(Self { client, token })
    }

    /// Builds a request for GitHub REST API.
    fn github_api_request_builder(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        debug!("{} {}…", request.method, request.url);

        let mut builder = self.github_api_request_builder(request.method, &request.url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!("{} from {}", status.as_u16(), request.url);

        Ok(ApiResponse { status, body })
    }

    async fn download(&self, url: &str) -> Result<Download, TransportError> {
        debug!("requesting download from {url}…");

        let response = self
            .github_api_request_builder(Method::GET, url)
            .send()
            .await?;
        let status = response.status();
        let stream = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(Download { status, stream })
    }
}
