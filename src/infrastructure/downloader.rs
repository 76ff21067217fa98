//! Streaming archive download with the license side-channel.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::errors::FeedError;
use crate::config::NuGetEnv;
use crate::domain::Credentials;
use crate::infrastructure::feeds::apply_auth;

/// Response bytes are flushed to disk in slices of this size.
const WRITE_CHUNK: usize = 4096;

/// Download `url` to `dest`, streaming the body to disk.
///
/// Basic credentials go out preemptively; token credentials fall back to the
/// host's ambient identity, so no header is attached. A non-success status
/// fails with the code and reason before anything is written.
pub async fn fetch_archive(
    env: &NuGetEnv,
    auth: Option<&Credentials>,
    url: &str,
    dest: &Path,
) -> Result<(), FeedError> {
    let client = env.http(url)?;
    let request = match auth {
        Some(Credentials::Basic { username, password }) => {
            client.get(url).basic_auth(username, Some(password))
        }
        Some(Credentials::Token(_)) | None => client.get(url),
    };

    let mut response = request.send().await.map_err(|source| FeedError::Network {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown").to_string(),
        });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FeedError::protocol(url, format!("cannot create cache directory: {e}")))?;
    }
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| FeedError::protocol(url, format!("cannot create {}: {e}", dest.display())))?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|source| FeedError::Network {
        url: url.to_string(),
        source,
    })? {
        for slice in chunk.chunks(WRITE_CHUNK) {
            file.write_all(slice)
                .await
                .map_err(|e| FeedError::protocol(url, format!("write to {} failed: {e}", dest.display())))?;
        }
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| FeedError::protocol(url, format!("flush of {} failed: {e}", dest.display())))?;

    debug!(%url, bytes = written, dest = %dest.display(), "archive downloaded");
    Ok(())
}

/// Start the license download as a detached task. The whole subtask lives
/// inside one wall-clock budget; [`await_license`] collects the outcome and
/// only ever logs.
pub fn spawn_license_download(
    env: &std::sync::Arc<NuGetEnv>,
    auth: Option<Credentials>,
    license_url: String,
    dest: PathBuf,
) -> JoinHandle<Result<(), FeedError>> {
    let env = env.clone();
    tokio::spawn(async move {
        let client = env.http(&license_url)?;
        let request = apply_auth(client.get(&license_url), auth.as_ref());
        let response = request.send().await.map_err(|source| FeedError::Network {
            url: license_url.clone(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: license_url.clone(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        let body = response.bytes().await.map_err(|source| FeedError::Network {
            url: license_url.clone(),
            source,
        })?;
        tokio::fs::write(&dest, &body)
            .await
            .map_err(|e| FeedError::protocol(&license_url, format!("cannot write license: {e}")))?;
        debug!(url = %license_url, dest = %dest.display(), "license downloaded");
        Ok(())
    })
}

/// Wait for the license task within the environment's budget. License
/// trouble never fails the package download.
pub async fn await_license(env: &NuGetEnv, mut task: JoinHandle<Result<(), FeedError>>, url: &str) {
    match tokio::time::timeout(env.license_budget(), &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(%url, error = %e, "license download failed"),
        Ok(Err(e)) => warn!(%url, error = %e, "license task aborted"),
        Err(_) => {
            task.abort();
            warn!(%url, "license download did not finish within budget");
        }
    }
}
