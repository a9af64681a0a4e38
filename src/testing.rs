//! Doubles shared by the unit tests.

use std::{
    collections::{BTreeMap, VecDeque},
    io::Write as _,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone as _, Utc};
use futures::StreamExt as _;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio_util::bytes::Bytes;

use crate::{
    framework::Clock,
    github::{ApiRequest, ApiResponse, Artifact, Download, Transport, TransportError},
    workflow::{CleanupInputs, Progress, Update},
};

/// 2026-10-16T08:00:00Z
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
}

/// A clock that only moves when slept on.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(epoch())
    }
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

/// Replays scripted responses in order. The last response of each queue repeats forever.
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    downloads: Mutex<VecDeque<(u16, Vec<u8>)>>,
    requests: Mutex<Vec<ApiRequest>>,
    downloaded: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn push(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn push_download(&self, status: u16, body: Vec<u8>) {
        self.downloads.lock().push_back((status, body));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloaded.lock().clone()
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> T {
        let mut queue = queue.lock();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("no scripted response left")
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request);
        Self::next(&self.responses)
    }

    async fn download(&self, url: &str) -> Result<Download, TransportError> {
        self.downloaded.lock().push(url.to_owned());
        let (status, body) = Self::next(&self.downloads);
        Ok(Download {
            status: StatusCode::from_u16(status).unwrap(),
            stream: futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
        })
    }
}

pub fn status_response(status: u16, body: &str) -> ApiResponse {
    ApiResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body: Bytes::from(body.to_owned()),
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    status_response(status, &body.to_string())
}

pub fn run_json(id: u64, name: &str, status: &str, conclusion: Option<&str>, created_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "display_title": name,
        "status": status,
        "conclusion": conclusion,
        "event": "workflow_dispatch",
        "head_branch": "main",
        "created_at": created_at.to_rfc3339(),
        "html_url": format!("https://github.com/acme/infra/actions/runs/{id}"),
    })
}

pub fn cleanup_inputs() -> CleanupInputs {
    CleanupInputs {
        aws_access_key_id: String::from("AKIAEXAMPLE"),
        aws_secret_access_key: String::from("secret"),
        region: String::from("eu-west-1"),
        action: String::from("analyze"),
        confirm: false,
        extra: BTreeMap::new(),
    }
}

pub fn artifact(name: &str, size_in_bytes: u64) -> Artifact {
    Artifact {
        id: 99,
        name: name.to_owned(),
        size_in_bytes,
        archive_download_url: format!("https://api.github.com/repos/acme/infra/actions/artifacts/99/{name}.zip"),
        expired: false,
        digest: None,
        created_at: None,
        expires_at: None,
    }
}

/// Builds a stored (uncompressed) zip archive.
pub fn zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let files: Vec<_> = files.iter().map(|(name, content)| (*name, content.as_bytes())).collect();
    build_zip(&files, zip::CompressionMethod::Stored)
}

/// Builds a deflated zip archive, the way GitHub packs artifacts.
pub fn deflated_zip_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let files: Vec<_> = files.iter().map(|(name, content)| (*name, content.as_bytes())).collect();
    build_zip(&files, zip::CompressionMethod::Deflated)
}

/// Builds a stored zip archive of arbitrary bytes.
pub fn zip_archive_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    build_zip(files, zip::CompressionMethod::Stored)
}

fn build_zip(files: &[(&str, &[u8])], method: zip::CompressionMethod) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().compression_method(method);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Records every update it receives.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<Update>>,
}

impl RecordingProgress {
    pub fn updates(&self) -> Vec<Update> {
        self.updates.lock().clone()
    }
}

impl Progress for RecordingProgress {
    fn update(&self, update: &Update) {
        self.updates.lock().push(update.clone());
    }
}
