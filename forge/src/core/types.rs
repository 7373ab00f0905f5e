//! Shared deterministic types for the repair loop.
//!
//! These types define the contracts between the loop, the comparator, and the
//! external collaborators. They hold no I/O state and serialize stably for
//! the attempt audit trail.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::diff::Diff;

/// One unit of work: a document plus the ground-truth output it must yield.
///
/// Immutable once created; built by the CLI before the workflow starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Target format/source name (e.g. "icici").
    pub target: String,
    /// Input document the generated parser must read.
    pub document_path: PathBuf,
    /// Ground-truth CSV the parser output must match.
    pub expected_path: PathBuf,
}

/// One generated program text, tagged with the iteration that produced it.
///
/// Each retry produces a fresh `Candidate`; an existing one is never patched
/// in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Iteration number (1-indexed).
    pub iteration: u32,
    /// Complete program source.
    pub source: String,
}

/// Ordered tabular data with positional row identity.
///
/// Cells are strings; both expected and actual sides are normalized to
/// strings before comparison, so numeric formatting differences are real
/// differences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Cell at `(row, col)` by index, treating short rows as empty cells.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Why a candidate execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecFailureKind {
    /// The candidate crashed or exited non-zero.
    Runtime,
    /// The candidate exceeded the wall-clock budget and was killed.
    Timeout,
    /// The candidate exited cleanly but printed output the runner could not parse.
    BadOutput,
}

/// Failure descriptor produced by the candidate executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecFailure {
    pub kind: ExecFailureKind,
    pub message: String,
    /// Captured stderr/stdout tail, when available.
    pub detail: Option<String>,
}

/// Tagged result of running one candidate against the task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The candidate produced structured records.
    Parsed(Table),
    /// The candidate faulted; the orchestrator keeps running.
    Failed(ExecFailure),
}

/// What went wrong in one iteration. All variants are retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The code generator returned an error or empty program text.
    Generation(String),
    /// The candidate could not be executed to a structured result.
    Execution(ExecFailure),
    /// The candidate ran but its output does not match the ground truth.
    Validation(Diff),
}

impl AttemptFailure {
    /// Stable tag used in audit metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Generation(_) => "generation",
            AttemptFailure::Execution(_) => "execution",
            AttemptFailure::Validation(_) => "validation",
        }
    }

    /// Human-readable rendering, also used as corrective feedback for the
    /// next generation round.
    pub fn render(&self) -> String {
        match self {
            AttemptFailure::Generation(message) => {
                format!("code generation failed: {message}")
            }
            AttemptFailure::Execution(failure) => {
                let mut buf = match failure.kind {
                    ExecFailureKind::Runtime => format!("execution failed: {}", failure.message),
                    ExecFailureKind::Timeout => format!("execution timed out: {}", failure.message),
                    ExecFailureKind::BadOutput => {
                        format!("unusable parser output: {}", failure.message)
                    }
                };
                if let Some(detail) = &failure.detail {
                    buf.push('\n');
                    buf.push_str(detail);
                }
                buf
            }
            AttemptFailure::Validation(diff) => diff.to_string(),
        }
    }
}

/// Append-only log entry for one attempt within a task.
///
/// `failure: None` means the candidate's output matched the ground truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationRecord {
    pub iteration: u32,
    pub candidate: Candidate,
    pub failure: Option<AttemptFailure>,
}

impl IterationRecord {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Why a failed workflow stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The task itself is unusable (unreadable document or ground truth).
    /// Fatal: no retry budget is consumed and no candidate is generated.
    MalformedTask(String),
    /// The iteration budget ran out before a candidate passed.
    Exhausted,
    /// Cancellation was requested between iterations.
    Cancelled,
}

/// Terminal value of one task's workflow. Exactly one per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowResult {
    Solved {
        /// The candidate whose output matched the ground truth.
        candidate: Candidate,
        /// How many iterations were spent, including the successful one.
        iterations: u32,
    },
    Failed {
        /// Every attempt in order, each with the reason it failed.
        records: Vec<IterationRecord>,
        stop: StopReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_tolerates_short_and_missing_rows() {
        let table = Table {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string()]],
        };
        assert_eq!(table.cell(0, 0), "1");
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn render_includes_execution_detail() {
        let failure = AttemptFailure::Execution(ExecFailure {
            kind: ExecFailureKind::Runtime,
            message: "exited with status 3".to_string(),
            detail: Some("Traceback: boom".to_string()),
        });
        let rendered = failure.render();
        assert!(rendered.contains("exited with status 3"));
        assert!(rendered.contains("Traceback: boom"));
    }
}
