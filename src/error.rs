use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid batch file pattern: {0}")]
    InvalidPattern(String),

    #[error("failed to read input file {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("required column missing from {table}: {column}")]
    MissingColumn { table: String, column: String },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("HDOCK request failed: {0}")]
    HdockHttp(String),

    #[error("HDOCK returned status {status}: {message}")]
    HdockStatus { status: u16, message: String },

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl From<csv::Error> for HarvestError {
    fn from(err: csv::Error) -> Self {
        HarvestError::Csv(err.to_string())
    }
}
