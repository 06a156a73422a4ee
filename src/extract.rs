use std::fs;
use std::path::Path;

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::HarvestError;
use crate::fs_util::{extract_tar_gz, validate_tar_gz};
use crate::store::ResultStore;

#[derive(Debug, Clone, Serialize)]
pub struct ExtractFailure {
    pub archive: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    pub extracted: Vec<String>,
    pub failed: Vec<ExtractFailure>,
}

/// Unpacks every bundle in the store root into the root itself and deletes each one that
/// unpacked cleanly. A failing bundle stays on disk and does not affect its siblings.
pub fn extract_archives(store: &ResultStore, pool: &ThreadPool) -> ExtractReport {
    let archives = store.archives();
    let target = store.root().as_std_path();
    let results = pool.install(|| {
        archives
            .par_iter()
            .map(|archive| (display_name(archive), extract_one(archive, target)))
            .collect::<Vec<_>>()
    });

    let mut report = ExtractReport::default();
    for (name, result) in results {
        match result {
            Ok(()) => report.extracted.push(name),
            Err(err) => {
                warn!(archive = %name, error = %err, "extraction failed");
                report.failed.push(ExtractFailure {
                    archive: name,
                    error: err.to_string(),
                });
            }
        }
    }
    info!(
        extracted = report.extracted.len(),
        failed = report.failed.len(),
        "archive extraction finished"
    );
    report
}

pub fn extract_one(archive: &Path, target: &Path) -> Result<(), HarvestError> {
    validate_tar_gz(archive)?;
    extract_tar_gz(archive, target)?;
    fs::remove_file(archive).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
