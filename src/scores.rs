use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::domain::{JobId, ScoreField};
use crate::error::HarvestError;

pub const RESULT_PREFIX: &str = "hdock_";
pub const RESULT_EXTENSION: &str = "out";

const FIELD_COUNT: usize = ScoreField::ALL.len();

/// One row of a result file. A field is `None` when its token was absent or not numeric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRecord {
    values: [Option<f64>; FIELD_COUNT],
}

impl ScoreRecord {
    pub fn get(&self, field: ScoreField) -> Option<f64> {
        self.values[field.index()]
    }

    pub fn binding_score(&self) -> Option<f64> {
        self.get(ScoreField::BindingScore)
    }
}

/// Parses one whitespace-delimited row.
///
/// Blank lines and lines with more than nine tokens are rejected. Shorter lines are kept
/// with the trailing fields missing.
pub fn parse_score_line(line: &str) -> Option<ScoreRecord> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.is_empty() || tokens.len() > FIELD_COUNT {
        return None;
    }
    let mut values = [None; FIELD_COUNT];
    for (slot, token) in values.iter_mut().zip(tokens) {
        *slot = parse_number(token);
    }
    Some(ScoreRecord { values })
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Streams the records of a result file, skipping rejected lines.
pub struct ScoreRows<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> ScoreRows<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for ScoreRows<R> {
    type Item = Result<ScoreRecord, HarvestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buffer);
                    if let Some(record) = parse_score_line(&line) {
                        return Some(Ok(record));
                    }
                }
                Err(err) => return Some(Err(HarvestError::Filesystem(err.to_string()))),
            }
        }
    }
}

pub fn open_score_rows(path: &Path) -> Result<ScoreRows<BufReader<File>>, HarvestError> {
    let file = File::open(path).map_err(|err| HarvestError::InputRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(ScoreRows::new(BufReader::new(file)))
}

pub fn result_file_name(id: &JobId) -> String {
    format!("{RESULT_PREFIX}{id}.{RESULT_EXTENSION}")
}

/// Job id encoded in a `hdock_<id>.out` file name.
pub fn job_id_from_result_file(file_name: &str) -> Option<JobId> {
    file_name
        .strip_prefix(RESULT_PREFIX)?
        .strip_suffix(&format!(".{RESULT_EXTENSION}"))?
        .parse()
        .ok()
}

/// The job's `hdock_<id>.out`, or failing that the first `.out` file in the folder.
pub fn primary_result_file(job_dir: &Path, id: &JobId) -> Option<PathBuf> {
    let named = job_dir.join(result_file_name(id));
    if named.is_file() {
        return Some(named);
    }
    let mut candidates = fs::read_dir(job_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| ext == RESULT_EXTENSION)
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();
    candidates.sort();
    candidates.into_iter().next()
}
