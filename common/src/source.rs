//! Building the ordered source file list: either by walking a directory or by loading a
//! previously saved checkpoint.

use anyhow::Context;
use async_recursion::async_recursion;
use rand::SeedableRng;
use rand::seq::SliceRandom;

/// Resolve `.` to the current working directory, other paths are returned as-is.
pub fn resolve_dir(path: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    if path == std::path::Path::new(".") {
        return std::env::current_dir().context("failed reading current working directory");
    }
    Ok(path.to_path_buf())
}

/// Recursively list all files under `root`, in name order within each directory.
///
/// Unreadable directories and entries are logged and skipped. Symlinks to files are
/// listed, symlinks to directories are not followed.
#[tracing::instrument]
pub async fn list_files(root: &std::path::Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let metadata = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &root))?;
    if !metadata.is_dir() {
        return Err(anyhow::anyhow!("{:?} is not a directory", root));
    }
    let mut files = Vec::new();
    walk(root, &mut files).await;
    tracing::info!("found {} file(s) under {:?}", files.len(), root);
    Ok(files)
}

#[async_recursion]
async fn walk(dir: &std::path::Path, files: &mut Vec<std::path::PathBuf>) {
    let paths = match read_dir_sorted(dir).await {
        Ok(paths) => paths,
        Err(error) => {
            tracing::error!("{:#}", &error);
            return;
        }
    };
    for path in paths {
        let symlink = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata.is_symlink(),
            Err(error) => {
                tracing::error!("failed reading metadata from {:?}: {}", &path, &error);
                continue;
            }
        };
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::error!("failed reading metadata from {:?}: {}", &path, &error);
                continue;
            }
        };
        if metadata.is_dir() {
            if symlink {
                tracing::warn!("not following symlinked directory {:?}", &path);
                continue;
            }
            walk(&path, files).await;
        } else {
            files.push(path);
        }
    }
}

async fn read_dir_sorted(dir: &std::path::Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", &dir))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &dir))?
    {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Shuffle `files` in place, reproducibly when `seed` is given.
pub fn shuffle(files: &mut [std::path::PathBuf], seed: Option<u64>) {
    match seed {
        Some(seed) => files.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed)),
        None => files.shuffle(&mut rand::thread_rng()),
    }
}

/// Load a saved list of remaining files and shuffle it.
pub async fn load_file_list(
    path: &std::path::Path,
    seed: Option<u64>,
) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut files = crate::checkpoint::load_file_list(path).await?;
    shuffle(&mut files, seed);
    tracing::info!("loaded {} file(s) from {:?}", files.len(), path);
    Ok(files)
}

/// Whether `path` names a saved file list rather than a directory to walk.
pub fn is_file_list(path: &std::path::Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

/// Root of the drive holding `path`: the mount point of its file system on unix.
///
/// The listed file may be gone by the time a saved list is loaded, so the walk starts at
/// the closest ancestor that still exists.
#[cfg(unix)]
pub async fn disk_root(path: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    use std::os::unix::fs::MetadataExt;
    if !path.is_absolute() {
        return Err(anyhow::anyhow!(
            "cannot determine the drive of {:?}, expected an absolute path",
            path
        ));
    }
    let mut ancestors = path.ancestors().skip(1);
    let mut existing = None;
    for ancestor in ancestors.by_ref() {
        if let Ok(metadata) = tokio::fs::symlink_metadata(ancestor).await {
            existing = Some((ancestor, metadata.dev()));
            break;
        }
    }
    let Some((mut root, device)) = existing else {
        return Err(anyhow::anyhow!(
            "cannot determine the drive of {:?}, none of its parents exist",
            path
        ));
    };
    for ancestor in ancestors {
        let metadata = tokio::fs::symlink_metadata(ancestor)
            .await
            .with_context(|| format!("failed reading metadata from {:?}", &ancestor))?;
        if metadata.dev() != device {
            break;
        }
        root = ancestor;
    }
    Ok(root.to_path_buf())
}

/// Root of the drive holding `path`, e.g. `E:\`.
#[cfg(not(unix))]
pub async fn disk_root(path: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
    let mut root = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::Prefix(_) | std::path::Component::RootDir => {
                root.push(component.as_os_str());
            }
            _ => break,
        }
    }
    if root.as_os_str().is_empty() || !root.has_root() {
        return Err(anyhow::anyhow!(
            "cannot determine the drive of {:?}, expected an absolute path",
            path
        ));
    }
    Ok(root)
}

/// Whether the directory at `path` can be listed, used to check a reconnected device.
pub async fn is_disk_readable(path: &std::path::Path) -> bool {
    tokio::fs::read_dir(path).await.is_ok()
}
