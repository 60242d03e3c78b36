use ignore::WalkBuilder;
use miette::{IntoDiagnostic, Result, WrapErr};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::model::Snapshot;

/// A snapshot file found on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotFile {
    pub path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<Snapshot> {
        let contents = std::fs::read_to_string(&self.path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read snapshot: {}", self.path.display()))?;
        Snapshot::from_json(&contents)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to parse snapshot: {}", self.path.display()))
    }
}

/// Finds `*.json` snapshots under an input path
#[derive(Debug, Default)]
pub struct SnapshotFinder {
    exclude: Vec<PathBuf>,
}

impl SnapshotFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip this file even if it lies under the input, e.g. the output snapshot
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    pub fn find(&self, root: &Path) -> Vec<SnapshotFile> {
        if root.is_file() {
            return vec![SnapshotFile::new(root.to_path_buf())];
        }
        if !root.exists() {
            trace!("Input does not exist: {}", root.display());
            return Vec::new();
        }
        debug!("Scanning for snapshots in: {}", root.display());

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .ignore(true)
            .follow_links(false)
            .build();

        let mut files: Vec<SnapshotFile> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| entry.path().extension().and_then(|e| e.to_str()) == Some("json"))
            .filter(|entry| !self.exclude.iter().any(|p| p == entry.path()))
            .map(|entry| SnapshotFile::new(entry.path().to_path_buf()))
            .collect();
        // Stable merge order regardless of directory iteration order
        files.sort();

        debug!("Found {} snapshots", files.len());
        files
    }
}

/// Read one snapshot file, or merge every snapshot in a directory
pub fn load_snapshot(input: &Path, finder: &SnapshotFinder) -> Result<Snapshot> {
    let files = finder.find(input);
    if files.is_empty() {
        return Err(miette::miette!(
            help = "pass a snapshot file or a directory containing *.json snapshots",
            "No snapshots found in {}",
            input.display()
        ));
    }

    let snapshots = files
        .par_iter()
        .map(SnapshotFile::read)
        .collect::<Result<Vec<_>>>()?;

    let mut merged = Snapshot::default();
    for snapshot in snapshots {
        merged.merge(snapshot);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = SnapshotFinder::new().find(dir.path());
        let names: Vec<_> = files
            .iter()
            .filter_map(|f| f.path.file_name()?.to_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_excluded_output_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        std::fs::write(dir.path().join("in.json"), "{}").unwrap();
        std::fs::write(&output, "{}").unwrap();

        let files = SnapshotFinder::new().exclude(&output).find(dir.path());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_load_merges_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"program": []}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();

        let snapshot = load_snapshot(dir.path(), &SnapshotFinder::new()).unwrap();
        assert!(snapshot.program.is_empty());
        assert!(load_snapshot(&dir.path().join("missing"), &SnapshotFinder::new()).is_err());
    }
}
