//! Reads a single file out of a zipped artifact without unpacking it to disk.

use async_zip::{base::read::stream::ZipFileReader, error::ZipError};
use futures::{
    TryStreamExt as _,
    io::{AsyncBufRead, AsyncRead},
};
use sha2::{Digest as _, Sha256};
use tracing::{debug, error, info, warn};

use crate::{Error, Result, github::ByteStream};

/// Streams through a zip archive and returns the raw content of the entry named exactly `name`, or [`None`] if the
/// archive has no such entry.
///
/// # Errors
///
/// Returns a [`ZipError`] if the archive is malformed or the entry fails its CRC check.
pub async fn read_entry<R>(reader: R, name: &str) -> Result<Option<Vec<u8>>, ZipError>
where
    R: AsyncBufRead + Unpin,
{
    let mut archive = ZipFileReader::new(reader);

    loop {
        let Some(mut reading) = archive.next_with_entry().await? else {
            return Ok(None);
        };

        let found = reading
            .reader()
            .entry()
            .filename()
            .as_str()
            .is_ok_and(|filename| filename == name);
        if found {
            let mut content = Vec::new();
            reading
                .reader_mut()
                .read_to_end_checked(&mut content)
                .await?;
            debug!("read {} bytes from {name}", content.len());
            return Ok(Some(content));
        }

        archive = reading.skip().await?;
    }
}

/// Wraps a download so that every byte read from it is fed to a SHA-256 hasher.
pub(crate) fn hashing_reader(stream: ByteStream, hasher: &mut Sha256) -> impl AsyncBufRead + Unpin + '_ {
    stream
        .map_ok(|bytes| {
            hasher.update(&bytes);
            bytes
        })
        .into_async_read()
}

/// Reads `reader` to its end so the hasher covers the whole download.
pub(crate) async fn drain<R>(reader: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    futures::io::copy(reader, &mut futures::io::sink()).await?;
    Ok(())
}

/// Compares the hash of a whole download against `digest` (`sha256:<hex>`). Other digest kinds are not checked.
///
/// # Errors
///
/// Returns [`Error::DigestMismatch`] naming `what` if the hashes differ.
pub(crate) fn verify_digest(hasher: Sha256, digest: Option<&str>, what: &str) -> Result<()> {
    match digest.and_then(|digest| digest.strip_prefix("sha256:")) {
        Some(expected) => {
            if hex::encode(hasher.finalize()) != expected.to_ascii_lowercase() {
                error!("downloaded {what} does not match {expected}");
                return Err(Error::DigestMismatch(what.to_owned()));
            }
            Ok(())
        }
        None => {
            warn!("digest not provided for {what}, skipping verification");
            Ok(())
        }
    }
}

/// Reads the entry `name` out of a downloaded artifact, checking the whole download against `digest`
/// (`sha256:<hex>`) when GitHub provided one.
///
/// # Errors
///
/// Returns [`Error::MissingReportFile`] if the entry is absent, [`Error::DigestMismatch`] if the download is
/// corrupted, or the underlying archive or I/O error.
pub async fn read_verified_entry(stream: ByteStream, digest: Option<&str>, name: &str) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    let mut read = hashing_reader(stream, &mut hasher);

    let entry = read_entry(&mut read, name).await?;
    drain(&mut read).await?;
    drop(read);

    verify_digest(hasher, digest, name)?;

    let content = entry.ok_or_else(|| {
        error!("{name} not found in artifact");
        Error::MissingReportFile(name.to_owned())
    })?;
    info!("extracted {name} from artifact");
    Ok(content)
}
