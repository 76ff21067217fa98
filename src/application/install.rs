//! Downloading archives into the cache and installing them, plus the
//! payload-file queries build integration asks for.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::details::get_details_from_nuget;
use crate::application::errors::AcquireError;
use crate::config::NuGetEnv;
use crate::domain::{Credentials, DownloadLink, PackageName, SemVer};
use crate::infrastructure::archive::copy_from_cache;
use crate::infrastructure::disk_cache::MetadataCache;
use crate::infrastructure::downloader::{await_license, fetch_archive, spawn_license_download};

/// Download a package into the archive cache and install it under the
/// layout's target folder for `root`. Returns the installed path.
///
/// The archive cache is consulted first: an existing non-empty archive
/// skips the network entirely (unless `force`). A fresh download always
/// re-resolves metadata, because cached download URLs go stale.
#[allow(clippy::too_many_arguments)]
pub async fn download_package(
    env: &Arc<NuGetEnv>,
    root: &Path,
    auth: Option<Credentials>,
    url: &str,
    group: Option<&str>,
    name: &PackageName,
    version: &SemVer,
    include_version_in_path: bool,
    force: bool,
) -> Result<PathBuf, AcquireError> {
    let cache = MetadataCache::new(env.cache_root());
    let archive_cache = cache.archive_file(name, version);
    let license_cache = cache.license_file(name, version);

    let cached_archive_usable = !force
        && tokio::fs::metadata(&archive_cache)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);

    if cached_archive_usable {
        debug!(archive = %archive_cache.display(), "archive already cached");
    } else {
        let metadata = get_details_from_nuget(env, force, auth.clone(), url, name, version).await?;
        let download_url = match metadata.download {
            DownloadLink::Remote(download_url) => download_url,
            DownloadLink::LocalFile(path) => {
                return Err(AcquireError::NothingToDownload {
                    name: name.as_str().to_string(),
                    version: version.to_string(),
                    path,
                });
            }
        };

        let license_task = (!metadata.license_url.is_empty()).then(|| {
            spawn_license_download(
                env,
                auth.clone(),
                metadata.license_url.clone(),
                license_cache.clone(),
            )
        });

        info!(package = %name, %version, url = %download_url, "downloading package");
        let downloaded = fetch_archive(env, auth.as_ref(), &download_url, &archive_cache).await;

        if let Some(task) = license_task {
            await_license(env, task, &metadata.license_url).await;
        }
        downloaded?;
    }

    let target_folder = env
        .layout()
        .target_folder(root, group, name, version, include_version_in_path);
    copy_from_cache(target_folder, archive_cache, license_cache, force).await
}

/// All files under `{folder}/lib`.
pub async fn lib_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    files_under(folder, "lib").await
}

/// All files under `{folder}/build`.
pub async fn targets_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    files_under(folder, "build").await
}

/// All files under `{folder}/analyzers`.
pub async fn analyzer_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    files_under(folder, "analyzers").await
}

/// Files below the immediate subdirectory of `folder` whose name matches
/// `subdir` case-insensitively. Absence is an empty result, not an error.
async fn files_under(folder: &Path, subdir: &str) -> std::io::Result<Vec<PathBuf>> {
    let folder = folder.to_path_buf();
    let subdir = subdir.to_string();
    tokio::task::spawn_blocking(move || {
        let Ok(entries) = std::fs::read_dir(&folder) else {
            return Ok(Vec::new());
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(&subdir));
            if matches && path.is_dir() {
                collect_files(&path, &mut files)?;
            }
        }
        Ok(files)
    })
    .await
    .map_err(|e| std::io::Error::other(format!("file scan task failed: {e}")))?
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_queries_match_case_insensitively_and_recurse() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("Lib").join("net45");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("a.dll"), "x").unwrap();
        std::fs::write(lib.join("a.xml"), "x").unwrap();
        std::fs::create_dir_all(dir.path().join("content")).unwrap();

        let files = lib_files(dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(targets_files(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_folder_is_an_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let files = analyzer_files(&dir.path().join("nope")).await.unwrap();
        assert!(files.is_empty());
    }
}
