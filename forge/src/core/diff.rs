//! Row/column comparison between expected and actual tables.
//!
//! `compare` is a pure function: no I/O, no hidden state, identical inputs
//! always yield an identical [`Diff`]. Structural problems in the actual
//! table (empty, extra columns, different row count, ragged rows) are encoded
//! as diff entries, never as errors.

use std::fmt;

use serde::Serialize;

use crate::core::types::Table;

/// A single cell whose value differs from the ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellMismatch {
    /// Row position (0-indexed, positional identity).
    pub row: usize,
    pub column: String,
    pub expected: String,
    pub actual: String,
}

/// Structured comparison result. Empty diff means the tables match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub expected_row_count: usize,
    pub actual_row_count: usize,
    /// Expected row positions with no actual row.
    pub missing_rows: Vec<usize>,
    /// Actual row positions beyond the expected row count.
    pub extra_rows: Vec<usize>,
    /// Expected columns absent from the actual table.
    pub missing_columns: Vec<String>,
    /// Actual columns absent from the expected table.
    pub extra_columns: Vec<String>,
    /// Same column set, different order.
    pub columns_reordered: bool,
    pub cell_mismatches: Vec<CellMismatch>,
}

impl Diff {
    /// True iff the actual table equals the expected table under
    /// row-positional, column-exact equality.
    pub fn is_empty(&self) -> bool {
        self.missing_rows.is_empty()
            && self.extra_rows.is_empty()
            && self.missing_columns.is_empty()
            && self.extra_columns.is_empty()
            && !self.columns_reordered
            && self.cell_mismatches.is_empty()
    }
}

// Cap on individually listed cell mismatches in the rendered summary. The
// structured diff always carries all of them.
const LISTED_MISMATCHES: usize = 10;

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "output matches the expected table");
        }
        writeln!(
            f,
            "output does not match: {} row(s) expected, {} produced",
            self.expected_row_count, self.actual_row_count
        )?;
        if !self.missing_rows.is_empty() {
            writeln!(f, "missing rows at positions: {}", join_indices(&self.missing_rows))?;
        }
        if !self.extra_rows.is_empty() {
            writeln!(f, "extra rows at positions: {}", join_indices(&self.extra_rows))?;
        }
        if !self.missing_columns.is_empty() {
            writeln!(f, "missing columns: {}", self.missing_columns.join(", "))?;
        }
        if !self.extra_columns.is_empty() {
            writeln!(f, "extra columns: {}", self.extra_columns.join(", "))?;
        }
        if self.columns_reordered {
            writeln!(f, "columns are present but in the wrong order")?;
        }
        for mismatch in self.cell_mismatches.iter().take(LISTED_MISMATCHES) {
            writeln!(
                f,
                "row {}, column '{}': got '{}', expected '{}'",
                mismatch.row, mismatch.column, mismatch.actual, mismatch.expected
            )?;
        }
        if self.cell_mismatches.len() > LISTED_MISMATCHES {
            writeln!(
                f,
                "... and {} more cell mismatch(es)",
                self.cell_mismatches.len() - LISTED_MISMATCHES
            )?;
        }
        Ok(())
    }
}

/// Compare actual output against the ground truth.
///
/// Rows align by position. Cells compare by exact equality of trimmed
/// strings, over columns and rows present on both sides. All mismatches are
/// collected in a single pass so callers can feed the full picture back to
/// the generator.
pub fn compare(expected: &Table, actual: &Table) -> Diff {
    let mut diff = Diff {
        expected_row_count: expected.rows.len(),
        actual_row_count: actual.rows.len(),
        ..Diff::default()
    };

    for column in &expected.columns {
        if !actual.columns.contains(column) {
            diff.missing_columns.push(column.clone());
        }
    }
    for column in &actual.columns {
        if !expected.columns.contains(column) {
            diff.extra_columns.push(column.clone());
        }
    }
    diff.columns_reordered = diff.missing_columns.is_empty()
        && diff.extra_columns.is_empty()
        && expected.columns != actual.columns;

    diff.missing_rows = (actual.rows.len()..expected.rows.len()).collect();
    diff.extra_rows = (expected.rows.len()..actual.rows.len()).collect();

    let shared_rows = expected.rows.len().min(actual.rows.len());
    for row in 0..shared_rows {
        for (exp_col, column) in expected.columns.iter().enumerate() {
            let Some(act_col) = actual.columns.iter().position(|c| c == column) else {
                continue;
            };
            let want = expected.cell(row, exp_col).trim();
            let got = actual.cell(row, act_col).trim();
            if want != got {
                diff.cell_mismatches.push(CellMismatch {
                    row,
                    column: column.clone(),
                    expected: want.to_string(),
                    actual: got.to_string(),
                });
            }
        }
    }

    diff
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::table;

    const BANK_COLUMNS: [&str; 5] = [
        "Date",
        "Description",
        "Debit Amount",
        "Credit Amount",
        "Balance",
    ];

    #[test]
    fn identical_tables_yield_empty_diff() {
        let expected = table(
            &BANK_COLUMNS,
            &[&["01-01-2024", "A", "100", "0", "900"]],
        );
        let diff = compare(&expected, &expected.clone());
        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "output matches the expected table");
    }

    #[test]
    fn compare_is_deterministic() {
        let expected = table(&BANK_COLUMNS, &[&["01-01-2024", "A", "100", "0", "900"]]);
        let actual = table(&BANK_COLUMNS, &[&["01-01-2024", "B", "0", "0", "900"]]);
        assert_eq!(compare(&expected, &actual), compare(&expected, &actual));
    }

    #[test]
    fn single_altered_cell_names_row_and_column() {
        let expected = table(&BANK_COLUMNS, &[&["01-01-2024", "A", "100", "0", "900"]]);
        let actual = table(&BANK_COLUMNS, &[&["01-01-2024", "A", "0", "0", "900"]]);

        let diff = compare(&expected, &actual);
        assert!(!diff.is_empty());
        assert_eq!(
            diff.cell_mismatches,
            vec![CellMismatch {
                row: 0,
                column: "Debit Amount".to_string(),
                expected: "100".to_string(),
                actual: "0".to_string(),
            }]
        );
        let rendered = diff.to_string();
        assert!(rendered.contains("row 0, column 'Debit Amount'"));
        assert!(rendered.contains("got '0', expected '100'"));
    }

    #[test]
    fn row_count_differences_become_missing_and_extra_rows() {
        let expected = table(&["a"], &[&["1"], &["2"], &["3"]]);
        let actual = table(&["a"], &[&["1"]]);
        let diff = compare(&expected, &actual);
        assert_eq!(diff.missing_rows, vec![1, 2]);
        assert!(diff.extra_rows.is_empty());

        let diff = compare(&actual, &expected);
        assert_eq!(diff.extra_rows, vec![1, 2]);
        assert!(diff.missing_rows.is_empty());
    }

    #[test]
    fn column_set_differences_are_reported_without_raising() {
        let expected = table(&["a", "b"], &[&["1", "2"]]);
        let actual = table(&["a", "c"], &[&["1", "2"]]);
        let diff = compare(&expected, &actual);
        assert_eq!(diff.missing_columns, vec!["b".to_string()]);
        assert_eq!(diff.extra_columns, vec!["c".to_string()]);
        // Shared column still compared.
        assert!(diff.cell_mismatches.is_empty());
    }

    #[test]
    fn reordered_columns_are_a_mismatch() {
        let expected = table(&["a", "b"], &[&["1", "2"]]);
        let actual = table(&["b", "a"], &[&["2", "1"]]);
        let diff = compare(&expected, &actual);
        assert!(diff.columns_reordered);
        assert!(!diff.is_empty());
        // Values are compared by column name, so the cells still agree.
        assert!(diff.cell_mismatches.is_empty());
    }

    #[test]
    fn empty_actual_table_is_tolerated() {
        let expected = table(&BANK_COLUMNS, &[&["01-01-2024", "A", "100", "0", "900"]]);
        let actual = Table::default();
        let diff = compare(&expected, &actual);
        assert_eq!(diff.missing_rows, vec![0]);
        assert_eq!(diff.missing_columns.len(), 5);
    }

    #[test]
    fn ragged_actual_rows_compare_as_empty_cells() {
        let expected = table(&["a", "b"], &[&["1", "2"]]);
        let actual = table(&["a", "b"], &[&["1"]]);
        let diff = compare(&expected, &actual);
        assert_eq!(diff.cell_mismatches.len(), 1);
        assert_eq!(diff.cell_mismatches[0].column, "b");
        assert_eq!(diff.cell_mismatches[0].actual, "");
    }

    #[test]
    fn cells_compare_on_trimmed_values() {
        let expected = table(&["a"], &[&[" 100 "]]);
        let actual = table(&["a"], &[&["100"]]);
        assert!(compare(&expected, &actual).is_empty());
    }

    #[test]
    fn summary_caps_listed_mismatches() {
        let rows: Vec<Vec<String>> = (0..15).map(|i| vec![i.to_string()]).collect();
        let expected = Table {
            columns: vec!["a".to_string()],
            rows: rows.clone(),
        };
        let actual = Table {
            columns: vec!["a".to_string()],
            rows: rows.iter().map(|_| vec!["x".to_string()]).collect(),
        };
        let diff = compare(&expected, &actual);
        assert_eq!(diff.cell_mismatches.len(), 15);
        assert!(diff.to_string().contains("and 5 more cell mismatch(es)"));
    }
}
