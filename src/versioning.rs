use crate::error::Result;
use crate::runner::{run_checked, ToolRunner};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Drives the data-versioning CLIs (dvc, git) through the tool runner and
/// records a content-addressed manifest of the snapshotted files.
pub struct DataVersioning<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> DataVersioning<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    /// Initializes dvc in the project unless a `.dvc` directory already
    /// exists.
    pub fn init_dvc(&self) -> Result<()> {
        if Path::new(".dvc").exists() {
            info!("DVC is already initialized");
            return Ok(());
        }
        run_checked(self.runner, "dvc", &["init"])?;
        info!("Initialized DVC in the project");
        Ok(())
    }

    /// Puts a data directory under dvc tracking. A missing path is skipped
    /// with a warning so reruns before ingestion stay harmless.
    pub fn add_data(&self, data_path: &Path) -> Result<()> {
        if !data_path.exists() {
            warn!("Data path '{}' does not exist, skipping", data_path.display());
            return Ok(());
        }
        let rendered = data_path.to_string_lossy();
        run_checked(self.runner, "dvc", &["add", rendered.as_ref()])?;
        info!("Added '{}' to DVC tracking", data_path.display());
        Ok(())
    }

    /// Stages and commits all changes. A failing commit (typically "nothing
    /// to commit" on an idempotent rerun) is logged and tolerated.
    pub fn commit(&self, message: &str) -> Result<()> {
        run_checked(self.runner, "git", &["add", "-A"])?;
        let output = self.runner.run("git", &["commit", "-m", message])?;
        if output.success() {
            info!("Committed data version: {}", message);
        } else {
            warn!("git commit skipped: {}", output.stderr.trim());
        }
        Ok(())
    }

    /// Tags the current commit with a version identifier.
    pub fn tag(&self, version: &str) -> Result<()> {
        run_checked(self.runner, "git", &["tag", version])?;
        info!("Tagged the commit with version '{}'", version);
        Ok(())
    }
}

/// Builds a path → sha256 manifest over every file in the given roots.
/// Missing roots contribute nothing; hidden files are skipped.
pub fn snapshot_manifest(roots: &[PathBuf]) -> Result<BTreeMap<String, String>> {
    let mut manifest = BTreeMap::new();
    for root in roots {
        if !root.exists() {
            continue;
        }
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let digest = hex::encode(hasher.finalize());
            manifest.insert(entry.path().to_string_lossy().into_owned(), digest);
        }
    }
    Ok(manifest)
}

/// Writes the manifest as pretty-printed JSON, replacing any previous one.
pub fn write_manifest(manifest: &BTreeMap<String, String>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    Ok(())
}
