use std::path::{Path, PathBuf};

use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{JobId, ScoreField};
use crate::error::HarvestError;
use crate::scores::{ScoreRecord, job_id_from_result_file, open_score_rows};

/// Prefix sizes behind `avg10`, `avg100` and `avg1000`.
pub const WINDOWS: [usize; 3] = [10, 100, 1000];

pub const STATISTICS: [&str; 5] = ["first", "avg10", "avg100", "avg1000", "avgAll"];

/// Summary of one score column over its numeric values only: `first` is the earliest
/// numeric value, and every statistic is `None` when the column has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldSummary {
    pub first: Option<f64>,
    pub avg10: Option<f64>,
    pub avg100: Option<f64>,
    pub avg1000: Option<f64>,
    pub avg_all: Option<f64>,
}

impl FieldSummary {
    fn values(&self) -> [Option<f64>; 5] {
        [self.first, self.avg10, self.avg100, self.avg1000, self.avg_all]
    }
}

/// Running count and sum for one column, with the sum frozen as each window fills.
#[derive(Debug, Clone, Copy, Default)]
struct FieldAccumulator {
    first: Option<f64>,
    count: usize,
    sum: f64,
    window_sums: [Option<f64>; 3],
}

impl FieldAccumulator {
    fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.first = Some(value);
        }
        self.sum += value;
        for (slot, window) in self.window_sums.iter_mut().zip(WINDOWS) {
            if self.count == window {
                *slot = Some(self.sum);
            }
        }
    }

    fn window_mean(&self, index: usize) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match self.window_sums[index] {
            Some(sum) => Some(sum / WINDOWS[index] as f64),
            None => Some(self.sum / self.count as f64),
        }
    }

    fn finish(&self) -> FieldSummary {
        FieldSummary {
            first: self.first,
            avg10: self.window_mean(0),
            avg100: self.window_mean(1),
            avg1000: self.window_mean(2),
            avg_all: (self.count > 0).then(|| self.sum / self.count as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobMetrics {
    pub download_id: JobId,
    /// Records read, including those with missing fields.
    pub rows: usize,
    pub fields: [FieldSummary; 9],
}

impl JobMetrics {
    pub fn field(&self, field: ScoreField) -> &FieldSummary {
        &self.fields[field.index()]
    }

    /// `download_ID` followed by `<statistic>_<field>` for every field.
    pub fn headers() -> Vec<String> {
        let mut headers = vec!["download_ID".to_string()];
        for field in ScoreField::ALL {
            for statistic in STATISTICS {
                headers.push(format!("{statistic}_{field}"));
            }
        }
        headers
    }

    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![self.download_id.to_string()];
        for summary in &self.fields {
            for value in summary.values() {
                cells.push(value.map(|v| v.to_string()).unwrap_or_default());
            }
        }
        cells
    }
}

/// Folds a record stream into per-column summaries without keeping the rows.
pub fn summarize_rows<I>(download_id: JobId, rows: I) -> Result<JobMetrics, HarvestError>
where
    I: IntoIterator<Item = Result<ScoreRecord, HarvestError>>,
{
    let mut accumulators = [FieldAccumulator::default(); 9];
    let mut count = 0usize;
    for row in rows {
        let record = row?;
        count += 1;
        for field in ScoreField::ALL {
            if let Some(value) = record.get(field) {
                accumulators[field.index()].push(value);
            }
        }
    }
    Ok(JobMetrics {
        download_id,
        rows: count,
        fields: accumulators.map(|acc| acc.finish()),
    })
}

pub fn summarize_file(download_id: JobId, path: &Path) -> Result<JobMetrics, HarvestError> {
    summarize_rows(download_id, open_score_rows(path)?)
}

/// Every `hdock_<id>.out` below `root`, sorted by path.
pub fn discover_result_files(root: &Path) -> Vec<(JobId, PathBuf)> {
    let mut found = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            match job_id_from_result_file(name) {
                Some(id) => Some((id, entry.path().to_path_buf())),
                None => {
                    if name.ends_with(".out") {
                        debug!(file = name, "skipping unexpected result file");
                    }
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    found.sort_by(|a, b| a.1.cmp(&b.1));
    found
}

/// Metrics for every extracted job under `root`, regardless of validation outcome.
/// Unreadable files are logged and left out.
pub fn collect_metrics(root: &Path, pool: &ThreadPool) -> Vec<JobMetrics> {
    let files = discover_result_files(root);
    let results = pool.install(|| {
        files
            .par_iter()
            .map(|(id, path)| (path, summarize_file(id.clone(), path)))
            .collect::<Vec<_>>()
    });

    let mut metrics = Vec::with_capacity(results.len());
    for (path, result) in results {
        match result {
            Ok(job) => metrics.push(job),
            Err(err) => warn!(file = %path.display(), error = %err, "skipping result file"),
        }
    }
    info!(jobs = metrics.len(), "metrics extraction finished");
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> Result<ScoreRecord, HarvestError> {
        Ok(crate::scores::parse_score_line(line).unwrap())
    }

    #[test]
    fn short_table_averages_over_available_rows() {
        let rows = (1..=4).map(|i| record(&format!("0 0 0 0 0 0 {i} 0 0")));
        let metrics = summarize_rows("job1".parse().unwrap(), rows).unwrap();
        let score = metrics.field(ScoreField::BindingScore);
        assert_eq!(score.first, Some(1.0));
        assert_eq!(score.avg10, Some(2.5));
        assert_eq!(score.avg100, Some(2.5));
        assert_eq!(score.avg1000, Some(2.5));
        assert_eq!(score.avg_all, Some(2.5));
    }

    #[test]
    fn missing_values_are_skipped_per_column() {
        let rows = vec![
            record("1 x 0 0 0 0 abc 0 0"),
            record("3 2 0 0 0 0 -5 0 0"),
        ];
        let metrics = summarize_rows("job1".parse().unwrap(), rows).unwrap();
        assert_eq!(metrics.rows, 2);
        assert_eq!(metrics.field(ScoreField::TranslationX).avg_all, Some(2.0));
        assert_eq!(metrics.field(ScoreField::TranslationX).first, Some(1.0));
        assert_eq!(metrics.field(ScoreField::TranslationY).first, Some(2.0));
        assert_eq!(metrics.field(ScoreField::TranslationY).avg_all, Some(2.0));
        assert_eq!(metrics.field(ScoreField::BindingScore).first, Some(-5.0));
        assert_eq!(metrics.field(ScoreField::BindingScore).avg10, Some(-5.0));
    }

    #[test]
    fn empty_table_has_no_statistics() {
        let metrics = summarize_rows("job1".parse().unwrap(), Vec::new()).unwrap();
        assert_eq!(metrics.rows, 0);
        assert_eq!(*metrics.field(ScoreField::Rmsd), FieldSummary::default());
        assert!(metrics.cells()[1..].iter().all(|cell| cell.is_empty()));
    }

    #[test]
    fn header_layout() {
        let headers = JobMetrics::headers();
        assert_eq!(headers.len(), 46);
        assert_eq!(headers[0], "download_ID");
        assert_eq!(headers[1], "first_Translation_X");
        assert_eq!(headers[5], "avgAll_Translation_X");
        assert_eq!(headers[45], "avgAll_Translational_ID");
    }
}
