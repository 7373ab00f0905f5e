//! Candidate execution in an isolated interpreter process.
//!
//! [`CandidateExecutor`] decouples the repair loop from how candidates run.
//! The production implementation spawns a separate interpreter process in a
//! fresh scratch directory, so a faulting or hanging candidate can never
//! corrupt the orchestrator: faults become [`ExecutionOutcome::Failed`], the
//! timeout kills the process, and the scratch directory is reclaimed on every
//! exit path.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Candidate, ExecFailure, ExecFailureKind, ExecutionOutcome};
use crate::io::process::run_with_timeout;
use crate::io::table::parse_table;

const HARNESS: &str = include_str!("harness.py");

/// How many trailing stderr lines to keep in failure descriptors.
const STDERR_TAIL_LINES: usize = 20;

/// Parameters for one candidate execution.
#[derive(Debug)]
pub struct ExecRequest<'a> {
    pub candidate: &'a Candidate,
    pub document_path: &'a Path,
    /// Wall-clock bound; the process is killed on expiry.
    pub timeout: Duration,
    /// Truncate captured candidate output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over candidate execution backends.
pub trait CandidateExecutor {
    /// Run the candidate against the document.
    ///
    /// Candidate faults must surface as [`ExecutionOutcome::Failed`]; `Err`
    /// is reserved for orchestrator-side problems (e.g. the scratch directory
    /// cannot be created).
    fn run(&self, request: &ExecRequest<'_>) -> Result<ExecutionOutcome>;
}

/// Executor that runs candidates under a separate Python interpreter.
///
/// The candidate and a fixed harness script are written into a fresh temp
/// directory; the harness imports the candidate's `parse(document_path)` and
/// prints the resulting records as CSV on stdout.
pub struct PythonExecutor {
    command: Vec<String>,
}

impl PythonExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl CandidateExecutor for PythonExecutor {
    #[instrument(skip_all, fields(iteration = request.candidate.iteration, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &ExecRequest<'_>) -> Result<ExecutionOutcome> {
        let interpreter = self
            .command
            .first()
            .ok_or_else(|| anyhow!("executor command is empty"))?;

        // Scratch dir is removed when `scratch` drops, on success and failure
        // alike, including the timeout path.
        let scratch = tempfile::tempdir().context("create scratch dir")?;
        let candidate_path = scratch.path().join("candidate.py");
        fs::write(&candidate_path, &request.candidate.source)
            .with_context(|| format!("write {}", candidate_path.display()))?;
        let harness_path = scratch.path().join("run_candidate.py");
        fs::write(&harness_path, HARNESS)
            .with_context(|| format!("write {}", harness_path.display()))?;

        info!(interpreter = %interpreter, "executing candidate");
        let mut cmd = Command::new(interpreter);
        cmd.args(&self.command[1..])
            .arg(&harness_path)
            .arg(&candidate_path)
            .arg(request.document_path)
            .current_dir(scratch.path());

        let output = run_with_timeout(cmd, None, request.timeout, request.output_limit_bytes)
            .context("run candidate")?;

        if output.timed_out {
            warn!("candidate timed out");
            return Ok(ExecutionOutcome::Failed(ExecFailure {
                kind: ExecFailureKind::Timeout,
                message: format!("candidate exceeded {:?} and was killed", request.timeout),
                detail: None,
            }));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "candidate failed");
            return Ok(ExecutionOutcome::Failed(ExecFailure {
                kind: ExecFailureKind::Runtime,
                message: format!("candidate exited with status {:?}", output.status.code()),
                detail: non_empty(output.stderr_tail(STDERR_TAIL_LINES)),
            }));
        }

        match parse_table(&output.stdout) {
            Ok(table) => {
                debug!(rows = table.rows.len(), "candidate produced records");
                Ok(ExecutionOutcome::Parsed(table))
            }
            Err(err) => Ok(ExecutionOutcome::Failed(ExecFailure {
                kind: ExecFailureKind::BadOutput,
                message: format!("candidate printed unparseable records: {err:#}"),
                detail: non_empty(output.stdout_lossy().chars().take(500).collect()),
            })),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> PythonExecutor {
        // The shell stands in for the interpreter; harness/candidate/document
        // paths become positional parameters it ignores.
        PythonExecutor::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    fn candidate() -> Candidate {
        Candidate {
            iteration: 1,
            source: "def parse(pdf_path): pass\n".to_string(),
        }
    }

    fn request<'a>(candidate: &'a Candidate, document: &'a Path) -> ExecRequest<'a> {
        ExecRequest {
            candidate,
            document_path: document,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn clean_exit_with_csv_parses_into_table() {
        let candidate = candidate();
        let executor = shell("printf 'Date,Balance\\n01-01-2024,900\\n'");
        let outcome = executor
            .run(&request(&candidate, Path::new("doc.pdf")))
            .expect("run");

        let ExecutionOutcome::Parsed(table) = outcome else {
            panic!("expected parsed outcome, got {outcome:?}");
        };
        assert_eq!(table.columns, vec!["Date", "Balance"]);
        assert_eq!(table.rows, vec![vec!["01-01-2024", "900"]]);
    }

    #[test]
    fn nonzero_exit_becomes_runtime_failure() {
        let candidate = candidate();
        let executor = shell("echo 'Traceback: boom' >&2; exit 3");
        let outcome = executor
            .run(&request(&candidate, Path::new("doc.pdf")))
            .expect("run");

        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(failure.kind, ExecFailureKind::Runtime);
        assert!(failure.detail.expect("detail").contains("boom"));
    }

    #[test]
    fn timeout_kills_and_tags_the_failure() {
        let candidate = candidate();
        let executor = shell("sleep 5");
        let outcome = executor
            .run(&ExecRequest {
                candidate: &candidate,
                document_path: Path::new("doc.pdf"),
                timeout: Duration::from_millis(100),
                output_limit_bytes: 10_000,
            })
            .expect("run");

        let ExecutionOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(failure.kind, ExecFailureKind::Timeout);
    }

    #[test]
    fn empty_executor_command_is_an_error() {
        let candidate = candidate();
        let executor = PythonExecutor::new(Vec::new());
        assert!(executor.run(&request(&candidate, Path::new("doc.pdf"))).is_err());
    }
}
