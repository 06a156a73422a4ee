use std::fs;
use std::path::Path;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::domain::{FailureReason, JobId, JobRecord, Outcome};
use crate::error::HarvestError;
use crate::job_id::extract_job_id;

/// URL patterns for a job's result page and archive.
#[derive(Debug, Clone)]
pub struct LinkTemplate {
    pub base_url: String,
    pub archive_name: String,
}

impl LinkTemplate {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            archive_name: config.archive_name.clone(),
        }
    }

    pub fn view_link(&self, id: &Outcome<JobId>) -> Outcome<String> {
        match id {
            Ok(id) => Ok(format!("{}{}/", self.base_prefix(), id)),
            Err(_) => Err(FailureReason::Upstream),
        }
    }

    pub fn download_link(&self, id: &Outcome<JobId>) -> Outcome<String> {
        match id {
            Ok(id) => Ok(format!("{}{}/{}", self.base_prefix(), id, self.archive_name)),
            Err(_) => Err(FailureReason::Upstream),
        }
    }

    fn base_prefix(&self) -> String {
        if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        }
    }
}

/// A batch row before any derived fields are computed.
#[derive(Debug, Clone, Default)]
pub struct RawBatchRow {
    pub job_name: String,
    pub receptor_file: String,
    pub ligand_file: String,
    pub submitter_email: String,
    pub response: Option<String>,
}

/// Derives id and links for one row.
pub fn normalize_row(row: RawBatchRow, links: &LinkTemplate) -> JobRecord {
    let download_id = extract_job_id(row.response.as_deref());
    let view_link = links.view_link(&download_id);
    let download_link = links.download_link(&download_id);
    JobRecord {
        job_name: row.job_name,
        receptor_file: row.receptor_file,
        ligand_file: row.ligand_file,
        submitter_email: row.submitter_email,
        response_html: row.response,
        download_id,
        view_link,
        download_link,
    }
}

/// Loads every batch file in `config.responses_dir` whose name matches the batch pattern.
///
/// Row order is preserved within each file. Files are visited in name order. Unreadable
/// directories and malformed files are logged and contribute no rows.
pub fn load_batches(config: &HarvestConfig) -> Result<Vec<JobRecord>, HarvestError> {
    let pattern = config.batch_regex()?;
    let links = LinkTemplate::from_config(config);
    Ok(load_batches_from(&config.responses_dir, &pattern, &links))
}

pub fn load_batches_from(dir: &Utf8Path, pattern: &Regex, links: &LinkTemplate) -> Vec<JobRecord> {
    let files = batch_files(dir.as_std_path(), pattern);
    if files.is_empty() {
        warn!(dir = %dir, "no response batch files found");
        return Vec::new();
    }

    let mut records = Vec::new();
    for file in &files {
        match read_batch_file(file, links) {
            Ok(batch) => {
                info!(file = %file.display(), rows = batch.len(), "loaded response batch");
                records.extend(batch);
            }
            Err(err) => warn!(file = %file.display(), error = %err, "skipping batch file"),
        }
    }
    info!(files = files.len(), records = records.len(), "normalized response batches");
    records
}

pub fn read_batch_file(path: &Path, links: &LinkTemplate) -> Result<Vec<JobRecord>, HarvestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| HarvestError::InputRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let headers = reader.headers()?.clone();
    let columns = BatchColumns::locate(&headers, &path.display().to_string())?;

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        match result {
            Ok(record) => records.push(normalize_row(columns.row(&record), links)),
            Err(err) => debug!(file = %path.display(), line, error = %err, "skipping malformed row"),
        }
    }
    Ok(records)
}

fn batch_files(dir: &Path, pattern: &Regex) -> Vec<std::path::PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot read responses directory");
            return Vec::new();
        }
    };
    let mut files = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| pattern.is_match(name))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    files.sort();
    files
}

/// Column positions, tolerant of the `JobName` / `job_name` header spellings.
struct BatchColumns {
    job_name: usize,
    receptor_file: usize,
    ligand_file: usize,
    email: usize,
    response: usize,
}

impl BatchColumns {
    fn locate(headers: &StringRecord, table: &str) -> Result<Self, HarvestError> {
        let find = |canonical: &str| {
            headers
                .iter()
                .position(|header| normalize_header(header) == canonical)
                .ok_or_else(|| HarvestError::MissingColumn {
                    table: table.to_string(),
                    column: canonical.to_string(),
                })
        };
        Ok(Self {
            job_name: find("jobname")?,
            receptor_file: find("receptorfile")?,
            ligand_file: find("ligandfile")?,
            email: find("email")?,
            response: find("response")?,
        })
    }

    fn row(&self, record: &StringRecord) -> RawBatchRow {
        let text = |index: usize| record.get(index).unwrap_or("").trim().to_string();
        let response = record
            .get(self.response)
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.to_string());
        RawBatchRow {
            job_name: text(self.job_name),
            receptor_file: text(self.receptor_file),
            ligand_file: text(self.ligand_file),
            submitter_email: text(self.email),
            response,
        }
    }
}

/// `JobName`, `job_name` and `jobname` all normalize to `jobname`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|ch| *ch != '_' && !ch.is_whitespace())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}
