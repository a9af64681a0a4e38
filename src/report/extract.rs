//! Unpacks a whole artifact to disk.

use std::path::{Path, PathBuf};

use async_zip::base::read::stream::ZipFileReader;
use futures::io::{AsyncBufRead, AsyncWriteExt as _};
use sha2::{Digest as _, Sha256};
use tokio_util::compat::TokioAsyncWriteCompatExt as _;
use tracing::{debug, error, info};

use crate::{
    Result,
    github::{Artifact, ByteStream, GitHubClient},
    report::archive::{drain, hashing_reader, verify_digest},
};

/// Turns an archive entry name into a relative path that stays inside the output directory.
pub(crate) fn sanitize_file_path(path: &str) -> PathBuf {
    // Replaces backwards slashes
    path.replace('\\', "/")
        // Sanitizes each component
        .split('/')
        .map(sanitize_filename::sanitize)
        .filter(|component| !component.is_empty() && component != "." && component != "..")
        .collect()
}

/// Extracts a zip archive to `path`, replacing whatever was there.
/// Entry paths are sanitized and intermediate directories are created as needed.
///
/// # Errors
///
/// Returns an error if the archive fails to read or a file fails to write.
pub async fn extract_archive<R, P>(reader: R, path: P) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    P: AsRef<Path> + Send + Sync,
{
    let path = path.as_ref();
    drop(tokio::fs::remove_dir_all(path).await);
    tokio::fs::create_dir_all(path).await?;

    let mut archive = ZipFileReader::new(reader);

    loop {
        let Some(mut reading) = archive.next_with_entry().await? else {
            return Ok(());
        };

        let Ok(name) = reading.reader().entry().filename().as_str().map(str::to_owned) else {
            archive = reading.skip().await?;
            continue;
        };
        let relative = sanitize_file_path(&name);
        if relative.as_os_str().is_empty() {
            archive = reading.skip().await?;
            continue;
        }
        let target = path.join(relative);

        if name.ends_with('/') {
            tokio::fs::create_dir_all(&target).await?;
        } else {
            // Parents may be missing if the archive lists no directory entries
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let mut writer = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await?
                .compat_write();
            futures::io::copy(reading.reader_mut(), &mut writer).await?;
            writer.flush().await?;
            debug!("extracted {}", target.display());
        }

        archive = reading.done().await?;
    }
}

/// Downloads an [`Artifact`] and extracts the archive to `path`, checking the whole download against the
/// artifact digest when GitHub provided one. The output is removed if the extraction fails or the digest does not
/// match.
///
/// # Errors
///
/// Returns [`Error::DigestMismatch`](crate::Error::DigestMismatch) for a corrupted download, or the download or
/// extraction error.
pub async fn download_and_extract<P>(client: &GitHubClient, artifact: &Artifact, path: P) -> Result<()>
where
    P: AsRef<Path> + Send + Sync,
{
    let path = path.as_ref();
    let stream = client.download(artifact).await?;
    info!("downloading artifact {artifact}…");

    match extract_verified(stream, artifact, path).await {
        Ok(()) => {
            info!("successfully extracted {artifact} to {}", path.display());
            Ok(())
        }
        Err(err) => {
            error!("failed to extract {artifact} to {}: {err}", path.display());
            drop(tokio::fs::remove_dir_all(path).await);
            Err(err)
        }
    }
}

async fn extract_verified(stream: ByteStream, artifact: &Artifact, path: &Path) -> Result<()> {
    let mut hasher = Sha256::new();
    let mut read = hashing_reader(stream, &mut hasher);

    extract_archive(&mut read, path).await?;
    drain(&mut read).await?;
    drop(read);

    verify_digest(hasher, artifact.digest.as_deref(), &artifact.name)
}
