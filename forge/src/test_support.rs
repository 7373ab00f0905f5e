//! Test-only scripted collaborators and task fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{ExecFailure, ExecFailureKind, ExecutionOutcome, Table, Task};
use crate::io::codegen::{CodegenClient, GenerateRequest};
use crate::io::executor::{CandidateExecutor, ExecRequest};

/// Build a table from string literals.
pub fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

/// Render a table as CSV text (for writing expected-output fixtures).
pub fn csv_text(table: &Table) -> String {
    let mut lines = vec![table.columns.join(",")];
    for row in &table.rows {
        lines.push(row.join(","));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// A minimal execution failure of the given kind.
pub fn exec_failure(kind: ExecFailureKind) -> ExecFailure {
    ExecFailure {
        kind,
        message: match kind {
            ExecFailureKind::Runtime => "candidate exited with status Some(1)".to_string(),
            ExecFailureKind::Timeout => "candidate exceeded 1s and was killed".to_string(),
            ExecFailureKind::BadOutput => "candidate printed unparseable records".to_string(),
        },
        detail: None,
    }
}

/// A task rooted in a temp directory, with a fake document and an expected
/// CSV written to disk. The directory lives as long as the fixture.
pub struct TaskFixture {
    temp: TempDir,
    pub task: Task,
}

impl TaskFixture {
    pub fn root(&self) -> &Path {
        self.temp.path()
    }
}

/// Write a deterministic task fixture for target "icici".
pub fn fixture_task(expected: &Table) -> TaskFixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let document_path = temp.path().join("statement.pdf");
    // Not a real PDF; enough printable content for analysis previews.
    fs::write(&document_path, b"%PDF-1.4\x00\x01Account Statement 2024\x02")
        .expect("write document");
    let expected_path = temp.path().join("result.csv");
    fs::write(&expected_path, csv_text(expected)).expect("write expected csv");

    let task = Task {
        target: "icici".to_string(),
        document_path,
        expected_path,
    };
    TaskFixture { temp, task }
}

/// Codegen client that replays canned results and records every prompt.
pub struct ScriptedCodegen {
    results: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedCodegen {
    pub fn new(results: Vec<Result<String, String>>) -> Self {
        Self {
            results: RefCell::new(results.into_iter().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// How many times `generate` was invoked.
    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl CodegenClient for ScriptedCodegen {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        match self.results.borrow_mut().pop_front() {
            Some(Ok(source)) => Ok(source),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted codegen exhausted")),
        }
    }
}

/// Executor that replays canned outcomes without spawning processes.
pub struct ScriptedExecutor {
    outcomes: RefCell<VecDeque<ExecutionOutcome>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<ExecutionOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into_iter().collect()),
        }
    }
}

impl CandidateExecutor for ScriptedExecutor {
    fn run(&self, _request: &ExecRequest<'_>) -> Result<ExecutionOutcome> {
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor exhausted"))
    }
}
