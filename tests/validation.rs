mod common;

use assert_matches::assert_matches;

use dock_harvest::domain::{FailureReason, JobId, Outcome, Signal};
use dock_harvest::store::ResultStore;
use dock_harvest::validation::{check_expected_count, check_score_sanity};

use common::{score_table, utf8, write_job_dir};

fn id(value: &str) -> Outcome<JobId> {
    Ok(value.parse().unwrap())
}

#[test]
fn folder_below_threshold_fails_count() {
    let temp = tempfile::tempdir().unwrap();
    write_job_dir(temp.path(), "job0001", 50, &score_table("-300.0", 10));
    let store = ResultStore::new(utf8(temp.path()));

    assert_eq!(
        check_expected_count(&id("job0001"), &store, 113),
        Signal::Failed(FailureReason::TooFewFiles {
            found: 50,
            expected: 113
        })
    );
    assert_eq!(check_expected_count(&id("job0001"), &store, 50), Signal::Worked);
}

#[test]
fn missing_folder_or_failed_id_fails_count() {
    let temp = tempfile::tempdir().unwrap();
    let store = ResultStore::new(utf8(temp.path()));
    assert_eq!(
        check_expected_count(&id("absent"), &store, 1),
        Signal::Failed(FailureReason::MissingDirectory)
    );
    assert_eq!(
        check_expected_count(&Err(FailureReason::TitleMissing), &store, 1),
        Signal::Failed(FailureReason::Upstream)
    );
}

#[test]
fn zero_top_score_fails_despite_nonzero_tail() {
    let temp = tempfile::tempdir().unwrap();
    write_job_dir(temp.path(), "job0001", 1, &score_table("0.0", 500));
    let store = ResultStore::new(utf8(temp.path()));
    assert_eq!(
        check_score_sanity(&id("job0001"), &store),
        Signal::Failed(FailureReason::ZeroScore)
    );
}

#[test]
fn score_sanity_passes_on_numeric_top_score() {
    let temp = tempfile::tempdir().unwrap();
    write_job_dir(temp.path(), "job0001", 1, &score_table("-251.77", 3));
    let store = ResultStore::new(utf8(temp.path()));
    assert_eq!(check_score_sanity(&id("job0001"), &store), Signal::Worked);
}

#[test]
fn score_sanity_failures_are_signals() {
    let temp = tempfile::tempdir().unwrap();
    write_job_dir(temp.path(), "text01", 1, &score_table("n/a", 3));
    write_job_dir(temp.path(), "empty01", 1, "\n\n");
    let store = ResultStore::new(utf8(temp.path()));

    assert_eq!(
        check_score_sanity(&id("text01"), &store),
        Signal::Failed(FailureReason::UnparsableScore)
    );
    assert_eq!(
        check_score_sanity(&id("empty01"), &store),
        Signal::Failed(FailureReason::EmptyScoreTable)
    );
    assert_matches!(
        check_score_sanity(&id("nofolder"), &store),
        Signal::Failed(FailureReason::MissingResultFile)
    );
}
