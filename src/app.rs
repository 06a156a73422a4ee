use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;

use crate::batch::load_batches;
use crate::config::HarvestConfig;
use crate::domain::JobRecord;
use crate::error::HarvestError;
use crate::extract::{ExtractReport, extract_archives};
use crate::fetch::{FetchSummary, fetch_archives};
use crate::hdock::ArchiveClient;
use crate::metrics::collect_metrics;
use crate::output::{AccessionMetadata, RunSummary, metadata_table, metrics_table, status_table};
use crate::rcsb::{StructureClient, StructureResult, describe_all, download_structures};
use crate::reconcile::{IDENTIFIER_COLUMN, ReconcileOptions, join_metrics, reconcile_identities};
use crate::resubmit::{ResubmitPlan, StageReport, plan_resubmission, stage_resubmission};
use crate::status::{ValidationStatus, validate_all};
use crate::store::ResultStore;
use crate::table::Table;
use crate::uniprot::{AnnotationClient, PLACEHOLDER, annotate_all};

#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Skip retrieval and work only with archives and folders already on disk.
    pub skip_download: bool,
}

#[derive(Debug, Clone)]
pub struct HarvestResult {
    pub records: Vec<JobRecord>,
    pub statuses: Vec<ValidationStatus>,
    pub fetch: Option<FetchSummary>,
    pub extraction: ExtractReport,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResult {
    pub jobs: usize,
    pub rows_written: usize,
    pub joined: bool,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub jobs: usize,
    pub rows_written: usize,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResubmitResult {
    pub plan: ResubmitPlan,
    /// `None` for a dry run.
    pub staged: Option<StageReport>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Runs the pipeline stages against one configuration. Network access goes through the
/// three client seams so tests substitute mocks.
#[derive(Clone)]
pub struct App<H: ArchiveClient, U: AnnotationClient, R: StructureClient> {
    config: HarvestConfig,
    hdock: H,
    uniprot: U,
    rcsb: R,
}

impl<H: ArchiveClient, U: AnnotationClient, R: StructureClient> App<H, U, R> {
    pub fn new(config: HarvestConfig, hdock: H, uniprot: U, rcsb: R) -> Self {
        Self {
            config,
            hdock,
            uniprot,
            rcsb,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Normalize, fetch, extract and validate, then write the final status table.
    /// Each stage completes before the next begins.
    pub fn harvest(
        &self,
        options: &HarvestOptions,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestResult, HarvestError> {
        let started = Instant::now();
        let pool = self.config.pool()?;
        let store = ResultStore::new(self.config.output_dir.clone());

        sink.event(ProgressEvent {
            message: format!("phase=Normalize; reading batches from {}", self.config.responses_dir),
            elapsed: None,
        });
        let mut records = load_batches(&self.config)?;
        store.ensure_root()?;

        let fetch = if options.skip_download {
            None
        } else {
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; {} jobs", records.len()),
                elapsed: Some(started.elapsed()),
            });
            Some(fetch_archives(&mut records, &store, &self.hdock, &pool))
        };

        sink.event(ProgressEvent {
            message: "phase=Extract; unpacking archives".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let extraction = extract_archives(&store, &pool);

        sink.event(ProgressEvent {
            message: "phase=Validate; checking job folders".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let statuses = validate_all(&records, &store, self.config.expected_file_count, &pool);

        status_table(&records, &statuses).write_csv(self.config.final_csv.as_std_path())?;
        let summary = RunSummary::new(&statuses, fetch.clone(), &extraction);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} of {} jobs valid, wrote {}",
                summary.valid_download.worked, summary.jobs, self.config.final_csv
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(HarvestResult {
            records,
            statuses,
            fetch,
            extraction,
            summary,
        })
    }

    /// Summarizes every extracted job and writes the metrics table, optionally left-joined
    /// onto `join` by `download_ID`.
    pub fn metrics(
        &self,
        join: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<MetricsResult, HarvestError> {
        let started = Instant::now();
        let pool = self.config.pool()?;
        sink.event(ProgressEvent {
            message: format!("phase=Metrics; scanning {}", self.config.output_dir),
            elapsed: None,
        });
        let metrics = collect_metrics(self.config.output_dir.as_std_path(), &pool);
        let table = metrics_table(&metrics);

        let table = match join {
            Some(path) => join_metrics(&Table::read_csv(path)?, &table)?,
            None => table,
        };
        table.write_csv(self.config.metrics_csv.as_std_path())?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; wrote {}", self.config.metrics_csv),
            elapsed: Some(started.elapsed()),
        });
        Ok(MetricsResult {
            jobs: metrics.len(),
            rows_written: table.len(),
            joined: join.is_some(),
            output: self.config.metrics_csv.to_string(),
        })
    }

    pub fn reconcile(
        &self,
        responses_csv: &Path,
        metadata_csv: &Path,
        out: &Path,
        valid_only: bool,
    ) -> Result<ReconcileResult, HarvestError> {
        let jobs = Table::read_csv(responses_csv)?;
        let metadata = Table::read_csv(metadata_csv)?;
        let options = ReconcileOptions {
            structure_extension: self.config.structure_extension.clone(),
            valid_only,
        };
        let mapped = reconcile_identities(&jobs, &metadata, &options)?;
        mapped.write_csv(out)?;
        Ok(ReconcileResult {
            jobs: jobs.len(),
            rows_written: mapped.len(),
            output: out.display().to_string(),
        })
    }

    pub fn resubmit(&self, dry_run: bool) -> Result<ResubmitResult, HarvestError> {
        let records = load_batches(&self.config)?;
        let plan = plan_resubmission(&records);
        let staged = if dry_run || plan.is_empty() {
            None
        } else {
            Some(stage_resubmission(&plan, &self.config.resubmit)?)
        };
        Ok(ResubmitResult { plan, staged })
    }

    /// Annotates each accession and lists its experimental and predicted structures.
    /// The table written to `out` has the `identifier` column `structures` reads.
    pub fn annotate(
        &self,
        accessions: &[String],
        out: Option<&Path>,
    ) -> Result<Vec<AccessionMetadata>, HarvestError> {
        let limit = self.config.concurrency_limit;
        let annotations = annotate_all(&self.uniprot, accessions, limit)?;
        let structures = describe_all(&self.rcsb, accessions, limit)?;
        let metadata = annotations
            .into_iter()
            .zip(structures)
            .map(|(annotation, structures)| AccessionMetadata {
                annotation,
                structures,
            })
            .collect::<Vec<_>>();
        if let Some(out) = out {
            metadata_table(&metadata).write_csv(out)?;
        }
        Ok(metadata)
    }

    /// Downloads the structure of every distinct `identifier` in the metadata table.
    pub fn structures(
        &self,
        metadata_csv: &Path,
        dest: &Utf8Path,
    ) -> Result<Vec<StructureResult>, HarvestError> {
        let metadata = Table::read_csv(metadata_csv)?;
        let column = metadata.require_column(IDENTIFIER_COLUMN, "metadata table")?;
        let mut seen = HashSet::new();
        let identifiers = metadata
            .rows()
            .iter()
            .filter_map(|row| row.get(column))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty() && *cell != PLACEHOLDER && seen.insert(cell.to_string()))
            .map(|cell| cell.to_string())
            .collect::<Vec<_>>();
        let pool = self.config.pool()?;
        Ok(download_structures(
            &self.rcsb,
            &identifiers,
            dest,
            &self.config.structure_extension,
            &pool,
        ))
    }
}
