use tracing::debug;

use crate::domain::{FailureReason, JobId, Outcome, Signal};
use crate::scores::{open_score_rows, primary_result_file};
use crate::store::{ResultStore, count_entries};

/// Passes when the job folder exists and holds at least `expected` entries.
pub fn check_expected_count(id: &Outcome<JobId>, store: &ResultStore, expected: usize) -> Signal {
    let Ok(id) = id else {
        return Signal::Failed(FailureReason::Upstream);
    };
    match count_entries(store.job_dir(id).as_std_path()) {
        None => Signal::Failed(FailureReason::MissingDirectory),
        Some(found) if found < expected => {
            debug!(job_id = %id, found, expected, "job folder incomplete");
            Signal::Failed(FailureReason::TooFewFiles { found, expected })
        }
        Some(_) => Signal::Worked,
    }
}

/// Passes when the top-ranked pose of the primary result file has a numeric, non-zero
/// binding score. Every problem with the file becomes a failed signal.
pub fn check_score_sanity(id: &Outcome<JobId>, store: &ResultStore) -> Signal {
    let Ok(id) = id else {
        return Signal::Failed(FailureReason::Upstream);
    };
    let job_dir = store.job_dir(id);
    let Some(path) = primary_result_file(job_dir.as_std_path(), id) else {
        return Signal::Failed(FailureReason::MissingResultFile);
    };
    let mut rows = match open_score_rows(&path) {
        Ok(rows) => rows,
        Err(err) => return Signal::Failed(FailureReason::Unreadable(err.to_string())),
    };
    match rows.next() {
        None => Signal::Failed(FailureReason::EmptyScoreTable),
        Some(Err(err)) => Signal::Failed(FailureReason::Unreadable(err.to_string())),
        Some(Ok(record)) => match record.binding_score() {
            None => Signal::Failed(FailureReason::UnparsableScore),
            Some(score) if score == 0.0 => Signal::Failed(FailureReason::ZeroScore),
            Some(_) => Signal::Worked,
        },
    }
}
