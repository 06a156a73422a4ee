#![allow(dead_code)]

use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use dock_harvest::config::HarvestConfig;

pub fn job_page(id: &str) -> String {
    format!(
        "<html><head><title>HDOCK Server: Job results for {id}</title></head><body>queued</body></html>"
    )
}

pub fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// A config whose every path lives under `root`.
pub fn config_in(root: &Path) -> HarvestConfig {
    let root = utf8(root);
    let mut config = HarvestConfig::default();
    config.responses_dir = root.join("responses");
    config.output_dir = root.join("output");
    config.final_csv = root.join("final_responses.csv");
    config.metrics_csv = root.join("parameters.csv");
    config.mapped_csv = root.join("mapped.csv");
    config.concurrency_limit = 2;
    config.resubmit.source_receptor_dir = root.join("receptor_pdbs");
    config.resubmit.source_ligand_dir = root.join("ligand_pdbs");
    config.resubmit.submit_receptor_dir = root.join("submit_receptors");
    config.resubmit.submit_ligand_dir = root.join("submit_ligands");
    config
}

/// Writes a batch CSV with the `job_name` header spelling.
/// Each row is `(job_name, receptor, ligand, response)`.
pub fn write_batch(dir: &Path, name: &str, rows: &[(&str, &str, &str, Option<&str>)]) {
    fs::create_dir_all(dir).unwrap();
    let mut writer = csv::Writer::from_path(dir.join(name)).unwrap();
    writer
        .write_record(["job_name", "receptor_file", "ligand_file", "email", "response"])
        .unwrap();
    for (job, receptor, ligand, response) in rows {
        writer
            .write_record([*job, *receptor, *ligand, "lab@example.org", response.unwrap_or("")])
            .unwrap();
    }
    writer.flush().unwrap();
}

/// Score table whose first pose has `first_score` and whose other poses score `-100.0`.
/// Starts with an over-long line and a blank line, both of which parsing skips.
pub fn score_table(first_score: &str, rows: usize) -> String {
    let mut out = String::from("1 2 3 4 5 6 7 8 9 10 11 12\n\n");
    for index in 0..rows {
        let score = if index == 0 { first_score.to_string() } else { "-100.0".to_string() };
        out.push_str(&format!("1.0 2.0 3.0 0.1 0.2 0.3 {score} 12.5 {index}\n"));
    }
    out
}

/// Builds `<id>.tar.gz` holding `<id>/hdock_<id>.out` plus enough filler entries to make
/// `file_count` files in the job folder.
pub fn write_job_archive(path: &Path, id: &str, file_count: usize, first_score: &str) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
    append(&mut builder, &format!("{id}/hdock_{id}.out"), score_table(first_score, 5).as_bytes());
    for index in 1..file_count {
        append(&mut builder, &format!("{id}/model_{index}.pdb"), b"ATOM\n");
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Writes an already extracted job folder directly.
pub fn write_job_dir(root: &Path, id: &str, file_count: usize, out_contents: &str) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("hdock_{id}.out")), out_contents).unwrap();
    for index in 1..file_count {
        fs::write(dir.join(format!("model_{index}.pdb")), b"ATOM\n").unwrap();
    }
}

fn append<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data).unwrap();
}
