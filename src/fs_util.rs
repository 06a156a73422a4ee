use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::HarvestError;

pub fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<(), HarvestError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        HarvestError::Archive(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    fs::create_dir_all(target_dir).map_err(|err| HarvestError::Filesystem(err.to_string()))?;

    let entries = archive
        .entries()
        .map_err(|err| HarvestError::Archive(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| HarvestError::Archive(err.to_string()))?;
        let unpacked = entry
            .unpack_in(target_dir)
            .map_err(|err| HarvestError::Archive(err.to_string()))?;
        if !unpacked {
            return Err(HarvestError::Archive(
                "archive entry path traversal detected".to_string(),
            ));
        }
    }
    Ok(())
}

/// Reads every entry to the end so a truncated or corrupt bundle is caught before
/// anything is written.
pub fn validate_tar_gz(archive_path: &Path) -> Result<(), HarvestError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        HarvestError::Archive(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|err| HarvestError::Archive(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| HarvestError::Archive(err.to_string()))?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| HarvestError::Archive(err.to_string()))?;
    }
    Ok(())
}
