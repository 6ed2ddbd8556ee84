use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Resolves the most recently modified file with the given extension under a
/// root directory, searching recursively.
///
/// Hidden files (names starting with `.`) are skipped. Extension matching is
/// case-insensitive. Ties in modification time resolve to the
/// lexicographically greater path, so the result never depends on directory
/// iteration order.
///
/// Returns `Ok(None)` when the subtree contains no matching files, and
/// `Err(NotFound)` when the root directory itself does not exist.
pub fn find_latest_file(root: &Path, extension: &str) -> Result<Option<PathBuf>> {
    if !root.is_dir() {
        return Err(PipelineError::NotFound(format!(
            "search root '{}' does not exist",
            root.display()
        )));
    }

    let wanted = extension.to_lowercase();
    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if !name.to_lowercase().ends_with(&wanted) {
            continue;
        }
        let modified = match entry.metadata() {
            Ok(meta) => match meta.modified() {
                Ok(time) => time,
                Err(e) => {
                    debug!("Skipping '{}': {}", entry.path().display(), e);
                    continue;
                }
            },
            Err(e) => {
                debug!("Skipping '{}': {}", entry.path().display(), e);
                continue;
            }
        };
        let path = entry.into_path();
        let newer = match &latest {
            None => true,
            Some((time, current)) => {
                modified > *time || (modified == *time && path > *current)
            }
        };
        if newer {
            latest = Some((modified, path));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
