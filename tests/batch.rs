mod common;

use std::fs;

use assert_matches::assert_matches;

use dock_harvest::batch::{LinkTemplate, load_batches, read_batch_file};
use dock_harvest::domain::FailureReason;
use dock_harvest::error::HarvestError;
use dock_harvest::job_id::extract_job_id;

use common::{config_in, job_page, write_batch};

#[test]
fn job_id_round_trips_through_a_batch() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    let page = job_page("67c074b475cea");
    write_batch(
        config.responses_dir.as_std_path(),
        "responses.csv",
        &[("rec_lig", "rec.pdb", "lig.pdb", Some(page.as_str()))],
    );

    let records = load_batches(&config).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.download_id.as_ref().unwrap().as_str(), "67c074b475cea");
    assert_eq!(
        record.view_link.as_deref().unwrap(),
        "http://hdock.phys.hust.edu.cn/data/67c074b475cea/"
    );
    assert_eq!(
        record.download_link.as_deref().unwrap(),
        "http://hdock.phys.hust.edu.cn/data/67c074b475cea/all_results.tar.gz"
    );
}

#[test]
fn page_without_title_fails_every_derived_field() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    write_batch(
        config.responses_dir.as_std_path(),
        "responses.csv",
        &[
            ("a", "r.pdb", "l.pdb", Some("<html><body>Service unavailable</body></html>")),
            ("b", "r.pdb", "l.pdb", None),
        ],
    );

    let records = load_batches(&config).unwrap();
    assert_matches!(records[0].download_id, Err(FailureReason::TitleMissing));
    assert_matches!(records[0].view_link, Err(FailureReason::Upstream));
    assert_matches!(records[0].download_link, Err(FailureReason::Upstream));
    assert_matches!(records[1].download_id, Err(FailureReason::NoResponse));
}

#[test]
fn empty_page_fails_only_its_own_row() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    let page = "<html><head><title>HDOCK Server: Job results for abc123</title></head></html>";
    write_batch(
        config.responses_dir.as_std_path(),
        "responses.csv",
        &[
            ("row_a", "r1.pdb", "l1.pdb", Some(page)),
            ("row_b", "r2.pdb", "l2.pdb", Some("<html></html>")),
        ],
    );

    let records = load_batches(&config).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].job_name, "row_a");
    assert_eq!(records[0].download_id.as_ref().unwrap().as_str(), "abc123");
    assert_eq!(
        records[0].download_link.as_deref().unwrap(),
        "http://hdock.phys.hust.edu.cn/data/abc123/all_results.tar.gz"
    );
    assert_eq!(records[1].job_name, "row_b");
    assert_matches!(records[1].download_id, Err(FailureReason::TitleMissing));
    assert_matches!(records[1].view_link, Err(FailureReason::Upstream));
    assert_matches!(records[1].download_link, Err(FailureReason::Upstream));
}

#[test]
fn batches_merge_in_name_order_and_ignore_other_files() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    let dir = config.responses_dir.as_std_path();
    write_batch(dir, "responses_2.csv", &[("second", "r2.pdb", "l2.pdb", None)]);
    write_batch(dir, "hdock_responses_1.csv", &[("first", "r1.pdb", "l1.pdb", None)]);
    write_batch(dir, "final_responses.csv", &[("ignored", "x.pdb", "y.pdb", None)]);

    let names = load_batches(&config)
        .unwrap()
        .into_iter()
        .map(|record| record.job_name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn camel_case_headers_are_accepted() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("responses.csv");
    fs::write(
        &path,
        "JobName,ReceptorFile,LigandFile,Email,Response\nj1,r.pdb,l.pdb,a@b.c,\n",
    )
    .unwrap();
    let links = LinkTemplate::from_config(&config_in(temp.path()));
    let records = read_batch_file(&path, &links).unwrap();
    assert_eq!(records[0].job_name, "j1");
    assert_eq!(records[0].receptor_file, "r.pdb");
}

#[test]
fn missing_required_column_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("responses.csv");
    fs::write(&path, "job_name,receptor_file\nj1,r.pdb\n").unwrap();
    let links = LinkTemplate::from_config(&config_in(temp.path()));
    assert_matches!(
        read_batch_file(&path, &links),
        Err(HarvestError::MissingColumn { .. })
    );
}

#[test]
fn missing_responses_dir_yields_no_records() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_in(temp.path());
    assert!(load_batches(&config).unwrap().is_empty());
}

#[test]
fn marker_must_be_in_the_title() {
    let html = "<title>Queue</title><h1>HDOCK Server: Job results for abc</h1>";
    assert_matches!(extract_job_id(Some(html)), Err(FailureReason::MarkerMissing));
}
