mod common;

use std::sync::Mutex;

use camino::Utf8Path;

use dock_harvest::app::{App, HarvestOptions};
use dock_harvest::error::HarvestError;
use dock_harvest::hdock::ArchiveClient;
use dock_harvest::output::JsonOutput;
use dock_harvest::rcsb::{StructureClient, StructureEntry};
use dock_harvest::table::Table;
use dock_harvest::uniprot::{AnnotationClient, ProteinAnnotation};

use common::{config_in, job_page, write_batch, write_job_archive};

/// Serves a complete archive, except for job ids starting with `zero` which get a zero
/// top score and `thin` which get too few files.
#[derive(Default)]
struct MockHdock {
    calls: Mutex<usize>,
}

impl ArchiveClient for MockHdock {
    fn download_archive(&self, _url: &str, destination: &Utf8Path) -> Result<u64, HarvestError> {
        *self.calls.lock().unwrap() += 1;
        let id = destination.file_name().unwrap().trim_end_matches(".tar.gz");
        let (files, score) = if id.starts_with("zero") {
            (5, "0.0")
        } else if id.starts_with("thin") {
            (2, "-120.0")
        } else {
            (5, "-250.0")
        };
        write_job_archive(destination.as_std_path(), id, files, score);
        Ok(1)
    }
}

struct NoUniprot;

impl AnnotationClient for NoUniprot {
    fn annotate(&self, _accession: &str) -> Result<ProteinAnnotation, HarvestError> {
        Err(HarvestError::UniprotHttp("offline".to_string()))
    }
}

struct NoRcsb;

impl StructureClient for NoRcsb {
    fn download_structure(&self, _identifier: &str, _destination: &Utf8Path) -> Result<u64, HarvestError> {
        Err(HarvestError::RcsbHttp("offline".to_string()))
    }

    fn search_entries(&self, _accession: &str) -> Result<Vec<String>, HarvestError> {
        Err(HarvestError::RcsbHttp("offline".to_string()))
    }

    fn entry_metadata(&self, _pdb_id: &str) -> Result<StructureEntry, HarvestError> {
        Err(HarvestError::RcsbHttp("offline".to_string()))
    }
}

fn harvest_app(temp: &std::path::Path) -> App<MockHdock, NoUniprot, NoRcsb> {
    let mut config = config_in(temp);
    config.expected_file_count = 5;
    let pages = ["good0001", "zero0001", "thin0001"].map(job_page);
    write_batch(
        config.responses_dir.as_std_path(),
        "responses.csv",
        &[
            ("r_l1", "r.pdb", "1ABC.pdb", Some(pages[0].as_str())),
            ("r_l2", "r.pdb", "2XYZ.pdb", Some(pages[1].as_str())),
            ("r_l3", "r.pdb", "AF-P1-F1.pdb", Some(pages[2].as_str())),
            ("r_l4", "r.pdb", "3DEF.pdb", Some("<html><title>Error</title></html>")),
        ],
    );
    App::new(config, MockHdock::default(), NoUniprot, NoRcsb)
}

#[test]
fn harvest_writes_final_table_with_per_job_signals() {
    let temp = tempfile::tempdir().unwrap();
    let app = harvest_app(temp.path());
    let result = app.harvest(&HarvestOptions::default(), &JsonOutput).unwrap();

    assert_eq!(result.summary.jobs, 4);
    assert_eq!(result.summary.valid_download.worked, 1);
    assert_eq!(result.summary.download_id.failed, 1);
    assert_eq!(result.extraction.extracted.len(), 3);

    let table = Table::read_csv(app.config().final_csv.as_std_path()).unwrap();
    assert_eq!(table.headers()[0], "download_ID");
    assert_eq!(table.len(), 4);
    let column = |row: usize, name: &str| table.cell(row, name).unwrap().to_string();

    assert_eq!(column(0, "download_ID"), "good0001");
    assert_eq!(column(0, "valid_download"), "worked");
    assert_eq!(column(1, "zero_out"), "failed");
    assert_eq!(column(1, "expected_count"), "worked");
    assert_eq!(column(1, "valid_download"), "failed");
    assert_eq!(column(2, "expected_count"), "failed");
    assert_eq!(column(2, "zero_out"), "worked");
    assert_eq!(column(3, "download_ID"), "failed");
    assert_eq!(column(3, "view_links"), "failed");
    assert_eq!(column(3, "valid_download"), "failed");
}

#[test]
fn rerun_is_idempotent_without_requests() {
    let temp = tempfile::tempdir().unwrap();
    let app = harvest_app(temp.path());
    let first = app.harvest(&HarvestOptions::default(), &JsonOutput).unwrap();
    let first_table = Table::read_csv(app.config().final_csv.as_std_path()).unwrap();

    let second = app.harvest(&HarvestOptions::default(), &JsonOutput).unwrap();
    let second_table = Table::read_csv(app.config().final_csv.as_std_path()).unwrap();

    let fetch = second.fetch.unwrap();
    assert_eq!(fetch.downloaded, 0);
    assert_eq!(fetch.already_extracted, 3);
    assert_eq!(first.fetch.unwrap().downloaded, 3);
    assert_eq!(first_table, second_table);
}

#[test]
fn metrics_join_onto_reconciled_table() {
    let temp = tempfile::tempdir().unwrap();
    let app = harvest_app(temp.path());
    app.harvest(&HarvestOptions::default(), &JsonOutput).unwrap();

    let metadata_path = temp.path().join("ligands.csv");
    std::fs::write(
        &metadata_path,
        "identifier,method\n1ABC,X-ray\nAF-P1-F1,Predicted\n",
    )
    .unwrap();
    let mapped_path = app.config().mapped_csv.as_std_path().to_path_buf();
    let reconciled = app
        .reconcile(
            app.config().final_csv.as_std_path(),
            &metadata_path,
            &mapped_path,
            false,
        )
        .unwrap();
    assert_eq!(reconciled.rows_written, 4);

    let result = app.metrics(Some(&mapped_path), &JsonOutput).unwrap();
    assert_eq!(result.jobs, 3);
    assert_eq!(result.rows_written, 4);

    let joined = Table::read_csv(app.config().metrics_csv.as_std_path()).unwrap();
    assert_eq!(joined.cell(0, "method"), Some("X-ray"));
    assert_eq!(joined.cell(0, "first_Binding_Score"), Some("-250"));
    assert_eq!(joined.cell(1, "method"), Some(""));
    assert_eq!(joined.cell(3, "first_Binding_Score"), Some(""));
}
