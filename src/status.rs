use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::domain::{JobRecord, Signal};
use crate::store::ResultStore;
use crate::validation::{check_expected_count, check_score_sanity};

/// Per-job stage signals and their conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    pub download_id: Signal,
    pub view_link: Signal,
    pub download_link: Signal,
    pub expected_count: Signal,
    pub zero_out: Signal,
    pub valid_download: Signal,
}

impl ValidationStatus {
    pub fn new(record: &JobRecord, expected_count: Signal, zero_out: Signal) -> Self {
        let download_id = Signal::from_outcome(&record.download_id);
        let view_link = Signal::from_outcome(&record.view_link);
        let download_link = Signal::from_outcome(&record.download_link);
        let valid_download = conjunction([
            &download_id,
            &view_link,
            &download_link,
            &expected_count,
            &zero_out,
        ]);
        Self {
            download_id,
            view_link,
            download_link,
            expected_count,
            zero_out,
            valid_download,
        }
    }

    pub fn evaluate(record: &JobRecord, store: &ResultStore, expected_files: usize) -> Self {
        let expected_count = check_expected_count(&record.download_id, store, expected_files);
        let zero_out = check_score_sanity(&record.download_id, store);
        Self::new(record, expected_count, zero_out)
    }

    pub fn is_valid(&self) -> bool {
        self.valid_download.is_worked()
    }
}

/// `Worked` only when every signal is; otherwise the first failure, reason included.
pub fn conjunction<'a, I>(signals: I) -> Signal
where
    I: IntoIterator<Item = &'a Signal>,
{
    signals
        .into_iter()
        .find(|signal| !signal.is_worked())
        .cloned()
        .unwrap_or(Signal::Worked)
}

/// Statuses index-aligned with `records`.
pub fn validate_all(
    records: &[JobRecord],
    store: &ResultStore,
    expected_files: usize,
    pool: &ThreadPool,
) -> Vec<ValidationStatus> {
    let statuses = pool.install(|| {
        records
            .par_iter()
            .map(|record| ValidationStatus::evaluate(record, store, expected_files))
            .collect::<Vec<_>>()
    });
    let valid = statuses.iter().filter(|status| status.is_valid()).count();
    info!(jobs = statuses.len(), valid, "validation finished");
    statuses
}
