use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::JobId;
use crate::error::HarvestError;

/// Extension of downloaded result bundles.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Layout of the working directory: `<root>/<job_id>.tar.gz` and `<root>/<job_id>/`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: Utf8PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn archive_path(&self, id: &JobId) -> Utf8PathBuf {
        self.root.join(format!("{id}.{ARCHIVE_EXTENSION}"))
    }

    pub fn job_dir(&self, id: &JobId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn ensure_root(&self) -> Result<(), HarvestError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))
    }

    /// Archives currently present in the root, in name order.
    pub fn archives(&self) -> Vec<PathBuf> {
        let suffix = format!(".{ARCHIVE_EXTENSION}");
        let Ok(entries) = fs::read_dir(self.root.as_std_path()) else {
            return Vec::new();
        };
        let mut archives = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.ends_with(&suffix))
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();
        archives.sort();
        archives
    }

    /// Writes a byte stream to `path` through a sibling temp file, so an interrupted
    /// transfer never leaves a truncated archive under the final name.
    pub fn write_stream_atomic<R: Read>(path: &Utf8Path, reader: &mut R) -> Result<u64, HarvestError> {
        let parent = path
            .parent()
            .ok_or_else(|| HarvestError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("dock-harvest-dl")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let written = io::copy(reader, temp.as_file_mut())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(written)
    }

    pub fn copy_file_atomic(source: &Path, dest: &Path) -> Result<(), HarvestError> {
        let parent = dest
            .parent()
            .ok_or_else(|| HarvestError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        let temp = Builder::new()
            .prefix("dock-harvest-file")
            .tempfile_in(parent)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        fs::copy(source, temp.path()).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        if dest.exists() {
            fs::remove_file(dest).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        temp.persist(dest)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Number of entries directly inside `dir`, or `None` when it is not a readable directory.
pub fn count_entries(dir: &Path) -> Option<usize> {
    if !dir.is_dir() {
        return None;
    }
    fs::read_dir(dir).ok().map(|entries| entries.count())
}

/// Deletes and recreates `dir`.
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}
