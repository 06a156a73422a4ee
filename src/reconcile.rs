use std::collections::HashMap;

use tracing::info;

use crate::domain::FAILED;
use crate::error::HarvestError;
use crate::table::Table;

pub const IDENTIFIER_COLUMN: &str = "identifier";
pub const LIGAND_COLUMN: &str = "LigandFile";
pub const JOB_KEY_COLUMN: &str = "download_ID";
pub const VALID_COLUMN: &str = "valid_download";

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Suffix removed once from the ligand file name.
    pub structure_extension: String,
    /// Drop jobs whose `valid_download` failed before joining.
    pub valid_only: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            structure_extension: ".pdb".to_string(),
            valid_only: false,
        }
    }
}

/// Metadata key for a ligand file: the name with `extension` removed from the end, once.
pub fn ligand_identifier(ligand_file: &str, extension: &str) -> String {
    let trimmed = ligand_file.trim();
    trimmed.strip_suffix(extension).unwrap_or(trimmed).to_string()
}

/// Left join keeping every `left` row in order.
///
/// Output columns are all `left` columns, then the `right` columns `left` lacks. A left row
/// with no match gets empty cells on the right; one with several matches is repeated.
pub fn left_join<F>(left: &Table, right: &Table, right_key: usize, mut left_key: F) -> Table
where
    F: FnMut(&[String]) -> Option<String>,
{
    let extra = right
        .headers()
        .iter()
        .enumerate()
        .filter(|(_, header)| left.column_index(header).is_none())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    let mut headers = left.headers().to_vec();
    headers.extend(extra.iter().map(|&index| right.headers()[index].clone()));

    let mut by_key = HashMap::<&str, Vec<usize>>::new();
    for (row_index, row) in right.rows().iter().enumerate() {
        if let Some(key) = row.get(right_key) {
            by_key.entry(key.as_str()).or_default().push(row_index);
        }
    }

    let mut joined = Table::new(headers);
    for row in left.rows() {
        let matches = left_key(row)
            .and_then(|key| by_key.get(key.as_str()).cloned())
            .unwrap_or_default();
        if matches.is_empty() {
            let mut out = row.clone();
            out.extend(extra.iter().map(|_| String::new()));
            joined.push_row(out);
            continue;
        }
        for right_index in matches {
            let right_row = &right.rows()[right_index];
            let mut out = row.clone();
            out.extend(
                extra
                    .iter()
                    .map(|&index| right_row.get(index).cloned().unwrap_or_default()),
            );
            joined.push_row(out);
        }
    }
    joined
}

/// Annotates job rows with ligand metadata keyed by the ligand file's identifier.
///
/// The derived `identifier` column follows the job columns; metadata columns come after.
pub fn reconcile_identities(
    jobs: &Table,
    metadata: &Table,
    options: &ReconcileOptions,
) -> Result<Table, HarvestError> {
    let ligand = jobs.require_column(LIGAND_COLUMN, "job table")?;
    let metadata_key = metadata.require_column(IDENTIFIER_COLUMN, "metadata table")?;

    let mut keyed = jobs.clone();
    if options.valid_only {
        if let Some(valid) = keyed.column_index_loose(VALID_COLUMN) {
            keyed.retain_rows(|row| row.get(valid).map(|cell| cell != FAILED).unwrap_or(true));
        }
    }
    let keyed = with_identifier(&keyed, ligand, &options.structure_extension);
    let identifier = keyed
        .column_index(IDENTIFIER_COLUMN)
        .ok_or_else(|| HarvestError::MissingColumn {
            table: "job table".to_string(),
            column: IDENTIFIER_COLUMN.to_string(),
        })?;

    let joined = left_join(&keyed, metadata, metadata_key, |row| row.get(identifier).cloned());
    info!(jobs = keyed.len(), rows = joined.len(), "reconciled job identities");
    Ok(joined)
}

/// Left join of an annotated table with the metrics table on `download_ID`.
pub fn join_metrics(mapped: &Table, metrics: &Table) -> Result<Table, HarvestError> {
    let left_key = mapped.require_column(JOB_KEY_COLUMN, "mapped table")?;
    let right_key = metrics.require_column(JOB_KEY_COLUMN, "metrics table")?;
    Ok(left_join(mapped, metrics, right_key, |row| {
        row.get(left_key).cloned()
    }))
}

fn with_identifier(jobs: &Table, ligand: usize, extension: &str) -> Table {
    let existing = jobs.column_index(IDENTIFIER_COLUMN);
    let mut headers = jobs.headers().to_vec();
    if existing.is_none() {
        headers.push(IDENTIFIER_COLUMN.to_string());
    }
    let mut table = Table::new(headers);
    for row in jobs.rows() {
        let key = ligand_identifier(row.get(ligand).map(String::as_str).unwrap_or(""), extension);
        let mut out = row.clone();
        match existing {
            Some(index) => out[index] = key,
            None => out.push(key),
        }
        table.push_row(out);
    }
    table
}
