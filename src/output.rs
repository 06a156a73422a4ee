use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{JobRecord, Signal, outcome_cell};
use crate::extract::ExtractReport;
use crate::fetch::FetchSummary;
use crate::metrics::JobMetrics;
use crate::rcsb::StructureEntry;
use crate::status::ValidationStatus;
use crate::table::Table;
use crate::uniprot::{PLACEHOLDER, ProteinAnnotation};

pub const FINAL_COLUMNS: [&str; 11] = [
    "download_ID",
    "ReceptorFile",
    "LigandFile",
    "Email",
    "JobName",
    "view_links",
    "download_links",
    "expected_count",
    "zero_out",
    "valid_download",
    "failure_reason",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// One row per job, index-aligned `records` and `statuses`.
pub fn status_table(records: &[JobRecord], statuses: &[ValidationStatus]) -> Table {
    let mut table = Table::new(FINAL_COLUMNS.iter().map(|c| c.to_string()).collect());
    for (record, status) in records.iter().zip(statuses) {
        table.push_row(vec![
            outcome_cell(&record.download_id),
            record.receptor_file.clone(),
            record.ligand_file.clone(),
            record.submitter_email.clone(),
            record.job_name.clone(),
            outcome_cell(&record.view_link),
            outcome_cell(&record.download_link),
            status.expected_count.to_string(),
            status.zero_out.to_string(),
            status.valid_download.to_string(),
            status
                .valid_download
                .reason()
                .map(|reason| reason.to_string())
                .unwrap_or_default(),
        ]);
    }
    table
}

pub fn metrics_table(metrics: &[JobMetrics]) -> Table {
    let mut table = Table::new(JobMetrics::headers());
    for job in metrics {
        table.push_row(job.cells());
    }
    table
}

/// UniProt annotation of one accession with the structures found for it.
#[derive(Debug, Clone, Serialize)]
pub struct AccessionMetadata {
    pub annotation: ProteinAnnotation,
    pub structures: Vec<StructureEntry>,
}

/// One row per structure, annotation columns first. An accession without
/// structures keeps a single row of placeholders.
pub fn metadata_table(metadata: &[AccessionMetadata]) -> Table {
    let mut headers = ProteinAnnotation::headers();
    headers.extend(StructureEntry::headers());
    let mut table = Table::new(headers);
    for item in metadata {
        let annotation = item.annotation.cells();
        if item.structures.is_empty() {
            let mut row = annotation;
            row.extend(StructureEntry::placeholder(PLACEHOLDER).cells());
            table.push_row(row);
            continue;
        }
        for structure in &item.structures {
            let mut row = annotation.clone();
            row.extend(structure.cells());
            table.push_row(row);
        }
    }
    table
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalCount {
    pub worked: usize,
    pub failed: usize,
}

impl SignalCount {
    fn add(&mut self, signal: &Signal) {
        if signal.is_worked() {
            self.worked += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub jobs: usize,
    pub download_id: SignalCount,
    pub view_link: SignalCount,
    pub download_link: SignalCount,
    pub expected_count: SignalCount,
    pub zero_out: SignalCount,
    pub valid_download: SignalCount,
    pub fetch: Option<FetchSummary>,
    pub extracted: usize,
    pub extraction_failures: usize,
    pub generated_at: String,
}

impl RunSummary {
    pub fn new(
        statuses: &[ValidationStatus],
        fetch: Option<FetchSummary>,
        extraction: &ExtractReport,
    ) -> Self {
        let mut summary = Self {
            jobs: statuses.len(),
            download_id: SignalCount::default(),
            view_link: SignalCount::default(),
            download_link: SignalCount::default(),
            expected_count: SignalCount::default(),
            zero_out: SignalCount::default(),
            valid_download: SignalCount::default(),
            fetch,
            extracted: extraction.extracted.len(),
            extraction_failures: extraction.failed.len(),
            generated_at: Utc::now().to_rfc3339(),
        };
        for status in statuses {
            summary.download_id.add(&status.download_id);
            summary.view_link.add(&status.view_link);
            summary.download_link.add(&status.download_link);
            summary.expected_count.add(&status.expected_count);
            summary.zero_out.add(&status.zero_out);
            summary.valid_download.add(&status.valid_download);
        }
        summary
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints progress lines to stderr so stdout carries only results.
pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) {
        println!("dock-harvest summary ({})", summary.generated_at);
        println!("  jobs:            {}", summary.jobs);
        let rows = [
            ("download_ID", summary.download_id),
            ("view_links", summary.view_link),
            ("download_links", summary.download_link),
            ("expected_count", summary.expected_count),
            ("zero_out", summary.zero_out),
            ("valid_download", summary.valid_download),
        ];
        for (name, count) in rows {
            println!("  {name:<16} worked {:>5}  failed {:>5}", count.worked, count.failed);
        }
        if let Some(fetch) = &summary.fetch {
            println!(
                "  fetch:           downloaded {}, skipped {}, failed {}, not attempted {}",
                fetch.downloaded,
                fetch.already_extracted + fetch.already_downloaded,
                fetch.failed,
                fetch.not_attempted
            );
        }
        println!(
            "  extraction:      {} extracted, {} failed",
            summary.extracted, summary.extraction_failures
        );
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
