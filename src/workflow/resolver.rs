//! Lists the artifacts of a successful run and fetches the report out of one.

use std::path::Path;

use tracing::{info, warn};

use crate::{
    Error, Result,
    github::{Artifact, GitHubClient},
    report::{ReportEntry, archive::read_verified_entry, parse_report},
    workflow::{Progress, SucceededRun, Update},
};

/// Lists the artifacts of `run`.
///
/// # Errors
///
/// Returns [`Error::NoArtifacts`] if the run produced none, or [`Error::ArtifactFetch`] if listing fails.
pub async fn resolve_artifacts(
    client: &GitHubClient,
    progress: &dyn Progress,
    run: &SucceededRun,
) -> Result<Vec<Artifact>> {
    let listed = client.list_artifacts(run.0.id).await?;
    if listed.total_count == 0 || listed.artifacts.is_empty() {
        return Err(Error::NoArtifacts);
    }

    progress.update(&Update::Artifacts {
        count: listed.artifacts.len(),
    });
    Ok(listed.artifacts)
}

/// Picks the artifact holding the report.
///
/// With `preferred`, the artifact of exactly that name. Otherwise the first listed one; a warning is logged when
/// several are listed. Expired artifacts are never picked.
///
/// # Errors
///
/// Returns [`Error::ArtifactNotFound`] if `preferred` is not listed, or [`Error::NoArtifacts`] if every artifact
/// expired.
pub fn select_artifact<'a>(artifacts: &'a [Artifact], preferred: Option<&str>) -> Result<&'a Artifact> {
    let mut live = artifacts.iter().filter(|artifact| !artifact.expired);

    match preferred {
        Some(name) => live
            .find(|artifact| artifact.name == name)
            .ok_or_else(|| Error::ArtifactNotFound(name.to_owned())),
        None => {
            let first = live.next().ok_or(Error::NoArtifacts)?;
            if artifacts.len() > 1 {
                warn!(
                    "{} artifacts listed, using the first one ({})",
                    artifacts.len(),
                    first.name
                );
            }
            Ok(first)
        }
    }
}

/// Downloads `artifact` and parses the report file `file_name` inside it.
///
/// # Errors
///
/// Returns an error if the download fails, the file is missing, or its content is not a valid report.
pub async fn fetch_report(
    client: &GitHubClient,
    progress: &dyn Progress,
    artifact: &Artifact,
    file_name: &str,
) -> Result<Vec<ReportEntry>> {
    progress.update(&Update::Downloading {
        artifact: artifact.name.clone(),
    });

    let stream = client.download(artifact).await?;
    let content = read_verified_entry(stream, artifact.digest.as_deref(), file_name).await?;
    let entries = parse_report(&content)?;
    info!("parsed {} report entries from {artifact}", entries.len());

    Ok(entries)
}

/// Downloads `artifact` once, unpacks it into `dir` and parses the report file `file_name` from the unpacked copy.
///
/// # Errors
///
/// Returns an error if the download or the extraction fails, the digest does not match, the file is missing, or its
/// content is not a valid report.
#[cfg(feature = "extract")]
pub async fn fetch_and_extract_report(
    client: &GitHubClient,
    progress: &dyn Progress,
    artifact: &Artifact,
    file_name: &str,
    dir: &Path,
) -> Result<Vec<ReportEntry>> {
    use crate::report::extract::{download_and_extract, sanitize_file_path};

    progress.update(&Update::Downloading {
        artifact: artifact.name.clone(),
    });
    download_and_extract(client, artifact, dir).await?;

    let content = match tokio::fs::read(dir.join(sanitize_file_path(file_name))).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingReportFile(file_name.to_owned()));
        }
        Err(err) => return Err(err.into()),
    };
    let entries = parse_report(&content)?;
    info!("parsed {} report entries from {}", entries.len(), dir.display());

    Ok(entries)
}

/// Without the `extract` feature the archive is only streamed: `dir` is ignored.
///
/// # Errors
///
/// See [`fetch_report`].
#[cfg(not(feature = "extract"))]
pub async fn fetch_and_extract_report(
    client: &GitHubClient,
    progress: &dyn Progress,
    artifact: &Artifact,
    file_name: &str,
    dir: &Path,
) -> Result<Vec<ReportEntry>> {
    warn!("built without the extract feature, not unpacking to {}", dir.display());
    fetch_report(client, progress, artifact, file_name).await
}
