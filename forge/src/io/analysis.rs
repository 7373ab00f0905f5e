//! Task analysis: readability checks and generation context.
//!
//! Runs exactly once per task, before the first generation round. Any error
//! here marks the task as malformed: the loop short-circuits to failure
//! without consuming retry budget or invoking the code generator.

use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::types::{Table, Task};
use crate::io::table::read_table;

/// How many expected rows to quote in the prompt.
const SAMPLE_ROWS: usize = 5;

/// Minimum run of printable characters worth keeping in the preview.
const MIN_RUN: usize = 4;

/// Everything the first generation round needs to know about a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAnalysis {
    /// Full ground-truth table, kept for comparison after each execution.
    pub expected: Table,
    /// Leading expected rows quoted in the prompt.
    pub sample_rows: Vec<Vec<String>>,
    pub document_name: String,
    pub document_size: u64,
    /// Printable text scraped from the raw document bytes. Real text
    /// extraction is the candidate's job; this only gives the generator a
    /// hint of what the document contains.
    pub document_preview: String,
}

/// Validate the task's references and gather the initial generation context.
pub fn analyze_task(task: &Task, preview_limit: usize) -> Result<TaskAnalysis> {
    let expected = read_table(&task.expected_path)
        .with_context(|| format!("expected output for target '{}'", task.target))?;
    if expected.columns.is_empty() {
        return Err(anyhow!(
            "expected output {} has no columns",
            task.expected_path.display()
        ));
    }

    let bytes = fs::read(&task.document_path)
        .with_context(|| format!("read document {}", task.document_path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!(
            "document {} is empty",
            task.document_path.display()
        ));
    }

    let document_name = task
        .document_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| task.document_path.display().to_string());
    let document_preview = printable_preview(&bytes, preview_limit);
    let sample_rows = expected.rows.iter().take(SAMPLE_ROWS).cloned().collect();

    debug!(
        target = %task.target,
        columns = expected.columns.len(),
        rows = expected.rows.len(),
        document_size = bytes.len(),
        "task analysis complete"
    );

    Ok(TaskAnalysis {
        sample_rows,
        document_name,
        document_size: bytes.len() as u64,
        document_preview,
        expected,
    })
}

/// Extract runs of printable ASCII from raw bytes, capped at `limit` chars.
///
/// Binary documents (PDFs) carry fragments of their text content inline; a
/// few readable runs are enough to orient the generator.
fn printable_preview(bytes: &[u8], limit: usize) -> String {
    let mut preview = String::new();
    let mut run = String::new();

    for &b in bytes {
        if b == b' ' || b.is_ascii_graphic() {
            run.push(b as char);
            continue;
        }
        if run.len() >= MIN_RUN {
            if !preview.is_empty() {
                preview.push('\n');
            }
            preview.push_str(&run);
            if preview.len() >= limit {
                preview.truncate(limit);
                return preview;
            }
        }
        run.clear();
    }
    if run.len() >= MIN_RUN && preview.len() < limit {
        if !preview.is_empty() {
            preview.push('\n');
        }
        preview.push_str(&run);
        preview.truncate(limit);
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_task, table};

    #[test]
    fn analyze_collects_schema_and_preview() {
        let fixture = fixture_task(&table(
            &["Date", "Description", "Balance"],
            &[&["01-01-2024", "A", "900"]],
        ));

        let analysis = analyze_task(&fixture.task, 2048).expect("analyze");
        assert_eq!(
            analysis.expected.columns,
            vec!["Date", "Description", "Balance"]
        );
        assert_eq!(analysis.sample_rows.len(), 1);
        assert!(analysis.document_size > 0);
        assert!(analysis.document_preview.contains("Statement"));
    }

    #[test]
    fn analyze_fails_on_missing_document() {
        let mut fixture = fixture_task(&table(&["a"], &[&["1"]]));
        fixture.task.document_path = fixture.task.document_path.with_file_name("gone.pdf");

        let err = analyze_task(&fixture.task, 2048).unwrap_err();
        assert!(err.to_string().contains("gone.pdf"));
    }

    #[test]
    fn analyze_fails_on_expected_without_columns() {
        let fixture = fixture_task(&Table::default());
        let err = analyze_task(&fixture.task, 2048).unwrap_err();
        assert!(format!("{err:#}").contains("no columns"));
    }

    #[test]
    fn preview_keeps_printable_runs_only() {
        let bytes = b"\x00\x01Account Statement\x02\x03ab\x00Balance 900\xff";
        let preview = printable_preview(bytes, 100);
        assert!(preview.contains("Account Statement"));
        assert!(preview.contains("Balance 900"));
        // Runs shorter than the threshold are dropped.
        assert!(!preview.contains("ab"));
    }

    #[test]
    fn preview_respects_limit() {
        let bytes = vec![b'x'; 10_000];
        let preview = printable_preview(&bytes, 16);
        assert_eq!(preview.len(), 16);
    }
}
