use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{FailureReason, JobRecord};
use crate::error::HarvestError;
use crate::hdock::ArchiveClient;
use crate::store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchAction {
    /// The id or link had already failed; nothing was requested.
    NotAttempted,
    AlreadyExtracted,
    AlreadyDownloaded,
    Downloaded,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchSummary {
    pub downloaded: usize,
    pub already_extracted: usize,
    pub already_downloaded: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl FetchSummary {
    fn record(&mut self, action: FetchAction) {
        match action {
            FetchAction::NotAttempted => self.not_attempted += 1,
            FetchAction::AlreadyExtracted => self.already_extracted += 1,
            FetchAction::AlreadyDownloaded => self.already_downloaded += 1,
            FetchAction::Downloaded => self.downloaded += 1,
            FetchAction::Failed => self.failed += 1,
        }
    }
}

/// Retrieves the archive for every record with a usable link.
///
/// Records are processed on `pool`; a failed retrieval downgrades only that record's
/// download link. Jobs whose folder or archive already exists issue no request.
pub fn fetch_archives<C: ArchiveClient>(
    records: &mut [JobRecord],
    store: &ResultStore,
    client: &C,
    pool: &ThreadPool,
) -> FetchSummary {
    let actions = pool.install(|| {
        records
            .par_iter_mut()
            .map(|record| fetch_one(record, store, client))
            .collect::<Vec<_>>()
    });

    let mut summary = FetchSummary::default();
    for action in actions {
        summary.record(action);
    }
    info!(
        downloaded = summary.downloaded,
        skipped = summary.already_extracted + summary.already_downloaded,
        failed = summary.failed,
        "archive retrieval finished"
    );
    summary
}

pub fn fetch_one<C: ArchiveClient>(
    record: &mut JobRecord,
    store: &ResultStore,
    client: &C,
) -> FetchAction {
    let (id, url) = match (&record.download_id, &record.download_link) {
        (Ok(id), Ok(url)) => (id.clone(), url.clone()),
        _ => return FetchAction::NotAttempted,
    };

    if store.job_dir(&id).as_std_path().exists() {
        debug!(job_id = %id, "job folder exists, skipping");
        return FetchAction::AlreadyExtracted;
    }
    let archive = store.archive_path(&id);
    if archive.as_std_path().exists() {
        debug!(job_id = %id, "archive already downloaded");
        return FetchAction::AlreadyDownloaded;
    }

    match client.download_archive(&url, &archive) {
        Ok(bytes) => {
            info!(job_id = %id, bytes, "downloaded archive");
            FetchAction::Downloaded
        }
        Err(err) => {
            warn!(job_id = %id, error = %err, "archive download failed");
            record.downgrade_download(failure_reason(&err));
            FetchAction::Failed
        }
    }
}

fn failure_reason(err: &HarvestError) -> FailureReason {
    match err {
        HarvestError::HdockStatus { status, .. } => FailureReason::HttpStatus(*status),
        other => FailureReason::Transport(other.to_string()),
    }
}
