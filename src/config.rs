use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

pub const DEFAULT_CONFIG_FILE: &str = "dock-harvest.json";

/// Settings shared by every pipeline stage. Unset fields take the documented defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarvestConfig {
    /// Directory holding the response batch CSVs.
    #[serde(default = "default_responses_dir")]
    pub responses_dir: Utf8PathBuf,
    /// Regex matched against batch file names.
    #[serde(default = "default_batch_pattern")]
    pub batch_pattern: String,
    /// Working directory for archives and extracted job folders.
    #[serde(default = "default_output_dir")]
    pub output_dir: Utf8PathBuf,
    #[serde(default = "default_final_csv")]
    pub final_csv: Utf8PathBuf,
    #[serde(default = "default_metrics_csv")]
    pub metrics_csv: Utf8PathBuf,
    #[serde(default = "default_mapped_csv")]
    pub mapped_csv: Utf8PathBuf,
    /// Prefix under which job pages and archives are published.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the result bundle below a job's page.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    /// Minimum entries in a job folder for a complete run.
    #[serde(default = "default_expected_file_count")]
    pub expected_file_count: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on simultaneous downloads, extractions and lookups.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Suffix stripped from ligand file names to form the metadata key.
    #[serde(default = "default_structure_extension")]
    pub structure_extension: String,
    #[serde(default)]
    pub resubmit: ResubmitDirs,
}

/// Where structure files live and where a resubmission batch is staged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResubmitDirs {
    #[serde(default = "default_source_receptor_dir")]
    pub source_receptor_dir: Utf8PathBuf,
    #[serde(default = "default_source_ligand_dir")]
    pub source_ligand_dir: Utf8PathBuf,
    #[serde(default = "default_submit_receptor_dir")]
    pub submit_receptor_dir: Utf8PathBuf,
    #[serde(default = "default_submit_ligand_dir")]
    pub submit_ligand_dir: Utf8PathBuf,
}

impl Default for ResubmitDirs {
    fn default() -> Self {
        Self {
            source_receptor_dir: default_source_receptor_dir(),
            source_ligand_dir: default_source_ligand_dir(),
            submit_receptor_dir: default_submit_receptor_dir(),
            submit_ligand_dir: default_submit_ligand_dir(),
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            responses_dir: default_responses_dir(),
            batch_pattern: default_batch_pattern(),
            output_dir: default_output_dir(),
            final_csv: default_final_csv(),
            metrics_csv: default_metrics_csv(),
            mapped_csv: default_mapped_csv(),
            base_url: default_base_url(),
            archive_name: default_archive_name(),
            expected_file_count: default_expected_file_count(),
            request_timeout_secs: default_request_timeout_secs(),
            concurrency_limit: default_concurrency_limit(),
            structure_extension: default_structure_extension(),
            resubmit: ResubmitDirs::default(),
        }
    }
}

impl HarvestConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_regex(&self) -> Result<Regex, HarvestError> {
        Regex::new(&self.batch_pattern)
            .map_err(|err| HarvestError::InvalidPattern(format!("{}: {err}", self.batch_pattern)))
    }

    pub fn pool(&self) -> Result<rayon::ThreadPool, HarvestError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency_limit.max(1))
            .build()
            .map_err(|err| HarvestError::ThreadPool(err.to_string()))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit config path, or `dock-harvest.json` from the current directory
    /// when present. Without either, the defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<HarvestConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(HarvestConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<HarvestConfig, HarvestError> {
        let config: HarvestConfig = serde_json::from_str(content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;
        config.batch_regex()?;
        Ok(config)
    }
}

fn default_responses_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/hdock_responses")
}

fn default_batch_pattern() -> String {
    r"^(hdock_)?responses.*\.csv$".to_string()
}

fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/hdock_output")
}

fn default_final_csv() -> Utf8PathBuf {
    Utf8PathBuf::from("data/final_responses.csv")
}

fn default_metrics_csv() -> Utf8PathBuf {
    Utf8PathBuf::from("data/hdock_out_parameters.csv")
}

fn default_mapped_csv() -> Utf8PathBuf {
    Utf8PathBuf::from("data/mapped_ligands.csv")
}

fn default_base_url() -> String {
    "http://hdock.phys.hust.edu.cn/data/".to_string()
}

fn default_archive_name() -> String {
    "all_results.tar.gz".to_string()
}

fn default_expected_file_count() -> usize {
    113
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_structure_extension() -> String {
    ".pdb".to_string()
}

fn default_source_receptor_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/receptor_pdbs")
}

fn default_source_ligand_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/ligand_pdbs")
}

fn default_submit_receptor_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/submit_jobs_receptors")
}

fn default_submit_ligand_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("data/submit_jobs_ligands")
}
