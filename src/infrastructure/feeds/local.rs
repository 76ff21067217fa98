//! The local-directory adapter: a folder of `.nupkg` archives acting as a
//! feed. Listing scans filenames; metadata comes from the nuspec embedded in
//! the matching archive, so no JSON cache is involved.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use crate::application::errors::AcquireError;
use crate::domain::{
    optimize_dependencies, DownloadLink, PackageMetadata, PackageName, SemVer, CACHE_VERSION,
};
use crate::infrastructure::nuspec;

/// List version strings found in `directory` for `name`.
///
/// A file contributes when its name matches `{name}.{version}.nupkg`
/// case-insensitively with a version starting in a digit. A missing
/// directory is an error, not an empty result: a configured local source
/// that does not exist is a broken setup.
pub async fn list_versions(
    directory: &Path,
    name: &PackageName,
) -> Result<Vec<String>, AcquireError> {
    let directory = directory.to_path_buf();
    let name = name.clone();
    run_blocking(move || list_versions_sync(&directory, &name)).await
}

fn list_versions_sync(directory: &Path, name: &PackageName) -> Result<Vec<String>, AcquireError> {
    if !directory.is_dir() {
        return Err(AcquireError::MissingLocalSource {
            path: directory.to_path_buf(),
        });
    }
    let pattern = Regex::new(&format!(
        r"(?i)^{}\.(\d.*)\.nupkg$",
        regex::escape(name.as_str())
    ))
    .map_err(|e| std::io::Error::other(format!("bad package name pattern: {e}")))?;

    let mut versions = Vec::new();
    for archive in walk_nupkgs(directory)? {
        let Some(file_name) = archive.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(captures) = pattern.captures(file_name) {
            versions.push(captures[1].to_string());
        }
    }
    Ok(versions)
}

/// Fetch metadata for one version out of a local directory.
pub async fn fetch_metadata(
    directory: &Path,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, AcquireError> {
    let directory = directory.to_path_buf();
    let name = name.clone();
    let version = version.clone();
    run_blocking(move || fetch_metadata_sync(&directory, &name, &version)).await
}

fn fetch_metadata_sync(
    directory: &Path,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, AcquireError> {
    let archive = find_archive(directory, name, version)?;
    debug!(archive = %archive.display(), "reading local package manifest");

    let manifest_xml = read_embedded_nuspec(&archive)?;
    let manifest = nuspec::parse_nuspec(&manifest_xml).map_err(|message| {
        AcquireError::Extraction {
            archive: archive.clone(),
            message,
            snippet: String::new(),
        }
    })?;

    Ok(PackageMetadata {
        cache_version: CACHE_VERSION.to_string(),
        package_name: manifest.id.unwrap_or_else(|| name.as_str().to_string()),
        source_url: directory.display().to_string(),
        download: DownloadLink::LocalFile(archive),
        license_url: manifest.license_url,
        unlisted: false,
        dependencies: optimize_dependencies(manifest.dependencies),
    })
}

/// Locate the archive by three successive strategies: the exact raw-version
/// name, the exact normalized-version name, then a recursive scan for any
/// archive whose filename carries the package key and ends in either version
/// spelling as its version token.
fn find_archive(
    directory: &Path,
    name: &PackageName,
    version: &SemVer,
) -> Result<PathBuf, AcquireError> {
    let raw = version.original();
    let normalized = version.normalize();

    for candidate in [
        directory.join(format!("{}.{raw}.nupkg", name.as_str())),
        directory.join(format!("{}.{normalized}.nupkg", name.as_str())),
    ] {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    if directory.is_dir() {
        let raw_lower = raw.to_lowercase();
        let normalized_lower = normalized.to_lowercase();
        for archive in walk_nupkgs(directory)? {
            let Some(file_name) = archive.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let lower = file_name.to_lowercase();
            let Some(stem) = lower.strip_suffix(".nupkg") else {
                continue;
            };
            if lower.contains(name.compare_key())
                && (has_version_token(stem, &raw_lower) || has_version_token(stem, &normalized_lower))
            {
                return Ok(archive);
            }
        }
    }

    Err(AcquireError::LocalArchiveNotFound {
        name: name.as_str().to_string(),
        version: version.to_string(),
        path: directory.to_path_buf(),
    })
}

/// Whether `stem` ends with `version` as a whole token, delimited by `.` or
/// `-`. A bare substring test would let a request for `1.0.0` claim a
/// `1.0.0-beta` archive.
fn has_version_token(stem: &str, version: &str) -> bool {
    stem.strip_suffix(version)
        .and_then(|prefix| prefix.chars().last())
        .is_some_and(|delimiter| delimiter == '.' || delimiter == '-')
}

fn read_embedded_nuspec(archive_path: &Path) -> Result<String, AcquireError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| AcquireError::Extraction {
        archive: archive_path.to_path_buf(),
        message: format!("not a readable archive: {e}"),
        snippet: archive_snippet(archive_path),
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| AcquireError::Extraction {
            archive: archive_path.to_path_buf(),
            message: format!("unreadable archive entry: {e}"),
            snippet: String::new(),
        })?;
        if entry.name().ends_with(".nuspec") {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return Ok(content);
        }
    }

    Err(AcquireError::Extraction {
        archive: archive_path.to_path_buf(),
        message: "archive contains no .nuspec manifest".to_string(),
        snippet: String::new(),
    })
}

fn walk_nupkgs(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![directory.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("nupkg"))
            {
                found.push(path);
            }
        }
    }
    Ok(found)
}

pub(crate) fn archive_snippet(path: &Path) -> String {
    const SNIPPET_LEN: usize = 512;
    match fs::read(path) {
        Ok(bytes) => {
            let take = bytes.len().min(SNIPPET_LEN);
            String::from_utf8_lossy(&bytes[..take]).into_owned()
        }
        Err(_) => String::new(),
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, AcquireError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AcquireError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AcquireError::Io(std::io::Error::other(format!("blocking task failed: {e}"))))?
}
