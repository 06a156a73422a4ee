use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::batch::normalize_header;
use crate::error::HarvestError;

/// A header row plus string cells; missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Column lookup that ignores case and underscores, so `LigandFile` finds `ligand_file`.
    pub fn column_index_loose(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header(name);
        self.headers
            .iter()
            .position(|header| normalize_header(header) == wanted)
    }

    pub fn require_column(&self, name: &str, table: &str) -> Result<usize, HarvestError> {
        self.column_index_loose(name)
            .ok_or_else(|| HarvestError::MissingColumn {
                table: table.to_string(),
                column: name.to_string(),
            })
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(|cell| cell.as_str())
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Reads a headed CSV. An unreadable file is an error; malformed records are skipped.
    pub fn read_csv(path: &Path) -> Result<Self, HarvestError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|err| HarvestError::InputRead {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let headers = reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut table = Table::new(headers);
        for (line, result) in reader.records().enumerate() {
            match result {
                Ok(record) => table.push_row(record.iter().map(|cell| cell.to_string()).collect()),
                Err(err) => debug!(file = %path.display(), line, error = %err, "skipping malformed row"),
            }
        }
        Ok(table)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), HarvestError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        }
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .map_err(|err| HarvestError::Filesystem(format!("{}: {err}", path.display())))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        info!(file = %path.display(), rows = self.rows.len(), "wrote table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_normalizes_width() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        table.push_row(vec!["1".to_string()]);
        table.push_row(vec!["1".to_string(), "2".to_string(), "3".to_string()]);
        assert_eq!(table.rows()[0], vec!["1", ""]);
        assert_eq!(table.rows()[1], vec!["1", "2"]);
    }

    #[test]
    fn csv_write_then_read() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("t.csv");
        let mut table = Table::new(vec!["LigandFile".to_string(), "note".to_string()]);
        table.push_row(vec!["1ABC.pdb".to_string(), "has, comma".to_string()]);
        table.write_csv(&path).unwrap();

        let read = Table::read_csv(&path).unwrap();
        assert_eq!(read, table);
        assert_eq!(read.column_index_loose("ligand_file"), Some(0));
        assert_eq!(read.cell(0, "note"), Some("has, comma"));
    }
}
