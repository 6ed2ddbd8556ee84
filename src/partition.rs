use crate::error::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Capture timestamps embedded in landing paths, e.g. `20250201_093000`.
static CAPTURE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{8}_\d{6})").unwrap());

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How the partition writer treats existing partition contents.
///
/// The two policies are mutually exclusive; the deployed default is
/// `Accumulate`. Mixing them across runs corrupts partition history, so the
/// choice is made once in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    /// Never delete existing partition members; timestamp-suffixed filenames
    /// keep same-day captures from colliding.
    #[default]
    Accumulate,
    /// Clear each destination day-directory before the first write of the
    /// batch, so only the current run's files remain.
    Replace,
}

/// Outcome of partitioning one batch of raw files.
#[derive(Debug, Default)]
pub struct PartitionSummary {
    pub copied: usize,
    pub failed: usize,
    pub destinations: Vec<PathBuf>,
}

/// Copies raw files into `stored_root/<source>/<yyyy>/<mm>/<dd>/` buckets.
pub struct PartitionWriter {
    stored_root: PathBuf,
    source: String,
    policy: PartitionPolicy,
}

impl PartitionWriter {
    pub fn new<P: Into<PathBuf>>(stored_root: P, source: &str, policy: PartitionPolicy) -> Self {
        Self {
            stored_root: stored_root.into(),
            source: source.to_string(),
            policy,
        }
    }

    /// Partitions every file found under the landing directory, recursively.
    ///
    /// Per-file failures are isolated: the offending file is counted and the
    /// batch continues. Files already copied stay on disk even when a later
    /// file fails.
    pub fn write_all(&self, landing_dir: &Path) -> Result<PartitionSummary> {
        let mut summary = PartitionSummary::default();
        let mut cleared: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(landing_dir).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            match self.write_file(entry.path(), &mut cleared) {
                Ok(destination) => {
                    info!(
                        "Copied '{}' to '{}'",
                        entry.path().display(),
                        destination.display()
                    );
                    summary.copied += 1;
                    summary.destinations.push(destination);
                }
                Err(e) => {
                    warn!("Failed to partition '{}': {}", entry.path().display(), e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Copies a single file into its partition bucket and returns the
    /// destination path.
    pub fn write_file(&self, source_file: &Path, cleared: &mut HashSet<PathBuf>) -> Result<PathBuf> {
        let captured_at = self.capture_time(source_file)?;
        let partition_dir = self
            .stored_root
            .join(&self.source)
            .join(captured_at.format("%Y").to_string())
            .join(captured_at.format("%m").to_string())
            .join(captured_at.format("%d").to_string());

        if self.policy == PartitionPolicy::Replace
            && cleared.insert(partition_dir.clone())
            && partition_dir.exists()
        {
            fs::remove_dir_all(&partition_dir)?;
        }
        fs::create_dir_all(&partition_dir)?;

        let destination = partition_dir.join(suffixed_name(source_file, &captured_at));
        fs::copy(source_file, &destination)?;
        Ok(destination)
    }

    /// Determines the capture timestamp for a raw file: a `yyyymmdd_HHMMSS`
    /// stamp embedded anywhere in its path wins; otherwise the filesystem
    /// modification time stands in.
    fn capture_time(&self, source_file: &Path) -> Result<NaiveDateTime> {
        let path_text = source_file.to_string_lossy();
        if let Some(capture) = CAPTURE_TIMESTAMP.captures(&path_text) {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(&capture[1], TIMESTAMP_FORMAT) {
                return Ok(parsed);
            }
        }
        let modified = fs::metadata(source_file)?.modified()?;
        Ok(DateTime::<Local>::from(modified).naive_local())
    }
}

/// Builds the destination filename, appending the capture timestamp so
/// same-day captures of the same logical file do not collide. A stem that
/// already carries the stamp is kept as-is.
fn suffixed_name(source_file: &Path, captured_at: &NaiveDateTime) -> String {
    let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
    let stem = source_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    if stem.contains(&stamp) {
        return source_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(stem);
    }
    match source_file.extension() {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, stamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn writer(root: &Path, policy: PartitionPolicy) -> PartitionWriter {
        PartitionWriter::new(root, "kaggle", policy)
    }

    #[test]
    fn partitions_by_embedded_capture_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("raw/kaggle/20250201_093000");
        fs::create_dir_all(&landing).unwrap();
        fs::write(landing.join("employees.csv"), "a,b\n1,2\n").unwrap();

        let stored = dir.path().join("stored/raw");
        let summary = writer(&stored, PartitionPolicy::Accumulate)
            .write_all(&landing.parent().unwrap().to_path_buf())
            .unwrap();

        assert_eq!(summary.copied, 1);
        assert_eq!(summary.failed, 0);
        let expected = stored.join("kaggle/2025/02/01/employees_20250201_093000.csv");
        assert!(expected.is_file());
    }

    #[test]
    fn falls_back_to_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        fs::create_dir_all(&landing).unwrap();
        let file = landing.join("plain.csv");
        fs::write(&file, "x").unwrap();

        let stored = dir.path().join("stored");
        let summary = writer(&stored, PartitionPolicy::Accumulate)
            .write_all(&landing)
            .unwrap();

        assert_eq!(summary.copied, 1);
        // The bucket tracks the file's mtime date
        let modified = fs::metadata(&file).unwrap().modified().unwrap();
        let day: NaiveDate = DateTime::<Local>::from(modified).date_naive();
        let bucket = stored
            .join("kaggle")
            .join(day.format("%Y").to_string())
            .join(day.format("%m").to_string())
            .join(day.format("%d").to_string());
        assert!(bucket.is_dir());
        assert_eq!(fs::read_dir(&bucket).unwrap().count(), 1);
    }

    #[test]
    fn accumulate_keeps_both_same_day_captures() {
        let dir = tempfile::tempdir().unwrap();
        let stored = dir.path().join("stored");
        let w = writer(&stored, PartitionPolicy::Accumulate);

        for stamp in ["20250201_080000", "20250201_200000"] {
            let landing = dir.path().join(format!("landing/{stamp}"));
            fs::create_dir_all(&landing).unwrap();
            fs::write(landing.join("employees.csv"), stamp).unwrap();
            w.write_all(&landing).unwrap();
        }

        let bucket = stored.join("kaggle/2025/02/01");
        assert_eq!(fs::read_dir(&bucket).unwrap().count(), 2);
    }

    #[test]
    fn replace_retains_only_the_current_run() {
        let dir = tempfile::tempdir().unwrap();
        let stored = dir.path().join("stored");
        let w = writer(&stored, PartitionPolicy::Replace);

        for stamp in ["20250201_080000", "20250201_200000"] {
            let landing = dir.path().join(format!("landing/{stamp}"));
            fs::create_dir_all(&landing).unwrap();
            fs::write(landing.join("employees.csv"), stamp).unwrap();
            w.write_all(&landing).unwrap();
        }

        let bucket = stored.join("kaggle/2025/02/01");
        let names: Vec<_> = fs::read_dir(&bucket)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["employees_20250201_200000.csv"]);
    }

    #[test]
    fn replace_clears_each_day_directory_once_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let stored = dir.path().join("stored");
        let w = writer(&stored, PartitionPolicy::Replace);

        // Two files with the same capture day in one batch must both survive.
        let landing = dir.path().join("landing/20250201_100000");
        fs::create_dir_all(&landing).unwrap();
        fs::write(landing.join("employees.csv"), "a").unwrap();
        fs::write(landing.join("departments.csv"), "b").unwrap();
        let summary = w.write_all(&landing).unwrap();

        assert_eq!(summary.copied, 2);
        let bucket = stored.join("kaggle/2025/02/01");
        assert_eq!(fs::read_dir(&bucket).unwrap().count(), 2);
    }

    #[test]
    fn stem_already_carrying_stamp_is_not_suffixed_twice() {
        let captured = NaiveDateTime::parse_from_str("20250201_093000", TIMESTAMP_FORMAT).unwrap();
        let name = suffixed_name(Path::new("employees_20250201_093000.csv"), &captured);
        assert_eq!(name, "employees_20250201_093000.csv");
    }

    #[test]
    fn per_file_failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        fs::create_dir_all(&landing).unwrap();
        fs::write(landing.join("ok.csv"), "fine").unwrap();

        let stored = dir.path().join("stored");
        let w = writer(&stored, PartitionPolicy::Accumulate);
        let mut cleared = HashSet::new();

        // A vanished source file fails alone
        assert!(w
            .write_file(&landing.join("gone.csv"), &mut cleared)
            .is_err());
        let summary = w.write_all(&landing).unwrap();
        assert_eq!(summary.copied, 1);
    }
}
