//! CSV reading for ground-truth files and candidate output.
//!
//! Both sides of the comparison flow through the same parser so their cell
//! values are normalized identically.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::types::Table;

/// Parse CSV bytes into a [`Table`]. The first record is the header.
///
/// Ragged rows are accepted; the comparator treats short rows as empty cells
/// and reports them as mismatches rather than refusing to parse.
pub fn parse_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .context("read csv header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("read csv record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    // An empty input yields an empty header record; normalize to no columns.
    let columns = if columns.len() == 1 && columns[0].is_empty() && rows.is_empty() {
        Vec::new()
    } else {
        columns
    };

    Ok(Table { columns, rows })
}

/// Read a CSV file into a [`Table`].
pub fn read_table(path: &Path) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    parse_table(&bytes).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let table = parse_table(b"Date,Description\n01-01-2024,A\n02-01-2024,B\n").expect("parse");
        assert_eq!(table.columns, vec!["Date", "Description"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["02-01-2024", "B"]);
    }

    #[test]
    fn accepts_ragged_rows() {
        let table = parse_table(b"a,b\n1\n1,2,3\n").expect("parse");
        assert_eq!(table.rows[0], vec!["1"]);
        assert_eq!(table.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = parse_table(b"").expect("parse");
        assert!(table.columns.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let table = parse_table(b"a,b\n\"x, y\",z\n").expect("parse");
        assert_eq!(table.rows[0], vec!["x, y", "z"]);
    }

    #[test]
    fn read_table_errors_on_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_table(&temp.path().join("missing.csv")).unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }
}
