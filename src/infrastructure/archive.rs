//! Installing cached archives: copy into the target folder, extract, and
//! sanitize what came out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::application::errors::AcquireError;
use crate::infrastructure::feeds::local::archive_snippet;

/// Install an archive from the cache into `target_folder`.
///
/// The copy is skipped when the archive is already in place (unless `force`,
/// which cleans the folder first). Extraction and the license copy follow;
/// any failure rolls the folder back before the error propagates, so a
/// half-installed package never survives.
pub async fn copy_from_cache(
    target_folder: PathBuf,
    cache_file: PathBuf,
    license_cache_file: PathBuf,
    force: bool,
) -> Result<PathBuf, AcquireError> {
    let result = install(target_folder.clone(), cache_file, license_cache_file, force).await;

    match result {
        Ok(path) => Ok(path),
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&target_folder).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(
                        folder = %target_folder.display(),
                        error = %cleanup,
                        "could not roll back target folder"
                    );
                }
            }
            Err(e)
        }
    }
}

async fn install(
    target_folder: PathBuf,
    cache_file: PathBuf,
    license_cache_file: PathBuf,
    force: bool,
) -> Result<PathBuf, AcquireError> {
    let archive_name = cache_file
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("cache file has no file name"))?;
    let installed_archive = target_folder.join(&archive_name);

    if force || !installed_archive.is_file() {
        if target_folder.exists() {
            tokio::fs::remove_dir_all(&target_folder).await?;
        }
        tokio::fs::create_dir_all(&target_folder).await?;
        tokio::fs::copy(&cache_file, &installed_archive).await?;
        debug!(archive = %installed_archive.display(), "archive copied into target folder");
    }

    extract_package(installed_archive.clone(), target_folder.clone()).await?;

    let license_target = target_folder.join("license.html");
    if license_cache_file.is_file() && !license_target.exists() {
        tokio::fs::copy(&license_cache_file, &license_target).await?;
    }

    Ok(target_folder)
}

/// Extract an archive into `target_folder`.
///
/// A folder that already holds anything besides the archive itself counts as
/// extracted and is left alone. Entry paths are confined to the target
/// folder. Entries are written fresh and carry the extraction time, never
/// the archive's own timestamps, so pre-1980 DOS dates some feeds emit
/// cannot reach the filesystem on any runtime. After extraction, entry
/// names that URL-decode to a different string are renamed to the decoded
/// form.
pub async fn extract_package(
    archive_path: PathBuf,
    target_folder: PathBuf,
) -> Result<(), AcquireError> {
    tokio::task::spawn_blocking(move || extract_package_sync(&archive_path, &target_folder))
        .await
        .map_err(|e| AcquireError::Io(io::Error::other(format!("extraction task failed: {e}"))))?
}

fn extract_package_sync(archive_path: &Path, target_folder: &Path) -> Result<(), AcquireError> {
    if already_extracted(archive_path, target_folder)? {
        debug!(folder = %target_folder.display(), "target folder already extracted");
        return Ok(());
    }
    fs::create_dir_all(target_folder)?;

    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| extraction_error(archive_path, e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| extraction_error(archive_path, e))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(AcquireError::Extraction {
                archive: archive_path.to_path_buf(),
                message: format!("entry '{}' escapes the target folder", entry.name()),
                snippet: String::new(),
            });
        };
        let dest = target_folder.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&dest)?;
            io::copy(&mut entry, &mut out).map_err(|e| AcquireError::Extraction {
                archive: archive_path.to_path_buf(),
                message: format!("could not write '{}': {e}", dest.display()),
                snippet: String::new(),
            })?;
        }
    }

    decode_entry_names(target_folder)?;
    Ok(())
}

fn extraction_error(archive_path: &Path, error: zip::result::ZipError) -> AcquireError {
    AcquireError::Extraction {
        archive: archive_path.to_path_buf(),
        message: error.to_string(),
        snippet: archive_snippet(archive_path),
    }
}

/// The folder counts as extracted when it holds anything other than the
/// archive itself.
fn already_extracted(archive_path: &Path, target_folder: &Path) -> io::Result<bool> {
    if !target_folder.is_dir() {
        return Ok(false);
    }
    let archive_name = archive_path.file_name();
    for entry in fs::read_dir(target_folder)? {
        let entry = entry?;
        if Some(entry.file_name().as_os_str()) != archive_name {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Depth-first rename pass: every file or directory whose name URL-decodes
/// to something different is renamed to the decoded form. Children are
/// handled before their parent so paths stay valid, and a rename is skipped
/// when the destination already exists.
fn decode_entry_names(folder: &Path) -> io::Result<()> {
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            decode_entry_names(&path)?;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Ok(decoded) = urlencoding::decode(name) else {
            continue;
        };
        if decoded != name {
            let renamed = folder.join(decoded.as_ref());
            if renamed.exists() {
                debug!(from = %path.display(), to = %renamed.display(), "decoded name taken, keeping original");
                continue;
            }
            fs::rename(&path, &renamed)?;
        }
    }
    Ok(())
}
