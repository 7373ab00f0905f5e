//! The generate-test-repair loop.
//!
//! One task flows through `analyze -> generate -> execute -> compare`; a
//! failing compare (or a generation/execution fault) feeds its failure
//! rendering back into the next generation round, up to a configured
//! iteration budget. The loop is an explicit counter loop, never recursion,
//! so termination holds regardless of collaborator behavior. Iterations are
//! strictly sequential: the next one starts only after the previous record is
//! appended and its artifacts are written.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::diff;
use crate::core::types::{
    AttemptFailure, Candidate, ExecFailure, ExecFailureKind, ExecutionOutcome, IterationRecord,
    StopReason, Task, WorkflowResult,
};
use crate::io::analysis::{TaskAnalysis, analyze_task};
use crate::io::attempt_log::write_attempt;
use crate::io::codegen::{CodegenClient, GenerateRequest};
use crate::io::config::ForgeConfig;
use crate::io::executor::{CandidateExecutor, ExecRequest};
use crate::io::prompt::{PriorAttempt, PromptEngine, PromptInputs};

/// Loop settings for one task.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    pub codegen_timeout: Duration,
    pub exec_timeout: Duration,
    pub output_limit_bytes: usize,
    pub preview_limit_bytes: usize,
    /// Root under which `.forge/attempts/` audit artifacts are written.
    pub log_root: PathBuf,
}

impl WorkflowConfig {
    pub fn from_config(cfg: &ForgeConfig, log_root: &Path) -> Self {
        Self {
            max_iterations: cfg.max_iterations,
            codegen_timeout: Duration::from_secs(cfg.codegen_timeout_secs),
            exec_timeout: Duration::from_secs(cfg.exec_timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
            preview_limit_bytes: cfg.preview_limit_bytes,
            log_root: log_root.to_path_buf(),
        }
    }
}

/// Run the repair loop for one task to its single terminal value.
///
/// An unreadable task short-circuits to failure with zero records and no
/// generator call. All other failures consume one iteration of budget each
/// and drive the retry. `cancelled` is checked between iterations; a set flag
/// stops the loop cleanly with the records gathered so far. `on_iteration` is
/// invoked once per resolved attempt, in order.
#[instrument(skip_all, fields(target = %task.target))]
pub fn run_workflow<C: CodegenClient, X: CandidateExecutor, F: FnMut(&IterationRecord)>(
    task: &Task,
    codegen: &C,
    executor: &X,
    config: &WorkflowConfig,
    cancelled: &AtomicBool,
    mut on_iteration: F,
) -> Result<WorkflowResult> {
    let analysis = match analyze_task(task, config.preview_limit_bytes) {
        Ok(analysis) => analysis,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "task is malformed, not retrying");
            return Ok(WorkflowResult::Failed {
                records: Vec::new(),
                stop: StopReason::MalformedTask(format!("{err:#}")),
            });
        }
    };

    let engine = PromptEngine::new();
    let mut records: Vec<IterationRecord> = Vec::new();

    for iteration in 1..=config.max_iterations {
        if cancelled.load(Ordering::SeqCst) {
            info!(iteration, "cancellation requested, stopping between iterations");
            return Ok(WorkflowResult::Failed {
                records,
                stop: StopReason::Cancelled,
            });
        }

        info!(iteration, max_iterations = config.max_iterations, "starting iteration");
        let started = Instant::now();
        let prior = records.last().map(|record| PriorAttempt {
            source: record.candidate.source.clone(),
            failure: record
                .failure
                .as_ref()
                .map(AttemptFailure::render)
                .unwrap_or_default(),
        });

        let record = run_iteration(task, &analysis, &engine, codegen, executor, config, iteration, prior);
        write_attempt(
            &config.log_root,
            &task.target,
            &record,
            started.elapsed().as_millis() as u64,
        )?;
        on_iteration(&record);

        let passed = record.passed();
        let candidate = record.candidate.clone();
        match &record.failure {
            None => info!(iteration, "candidate output matches the ground truth"),
            Some(failure) => info!(iteration, kind = failure.kind(), "iteration failed"),
        }
        records.push(record);

        if passed {
            return Ok(WorkflowResult::Solved {
                candidate,
                iterations: iteration,
            });
        }
    }

    info!(max_iterations = config.max_iterations, "iteration budget exhausted");
    Ok(WorkflowResult::Failed {
        records,
        stop: StopReason::Exhausted,
    })
}

/// One generate -> execute -> compare cycle, resolved to a record.
///
/// Never returns an error: collaborator faults become the record's failure so
/// the loop can fold them into the next round's feedback.
#[allow(clippy::too_many_arguments)]
fn run_iteration<C: CodegenClient, X: CandidateExecutor>(
    task: &Task,
    analysis: &TaskAnalysis,
    engine: &PromptEngine,
    codegen: &C,
    executor: &X,
    config: &WorkflowConfig,
    iteration: u32,
    prior: Option<PriorAttempt>,
) -> IterationRecord {
    let generation_failure = |message: String| IterationRecord {
        iteration,
        candidate: Candidate {
            iteration,
            source: String::new(),
        },
        failure: Some(AttemptFailure::Generation(message)),
    };

    let inputs = PromptInputs {
        target: &task.target,
        analysis,
        prior,
    };
    let prompt = match engine.render_generate(&inputs) {
        Ok(prompt) => prompt,
        Err(err) => return generation_failure(format!("{err:#}")),
    };
    let source = match codegen.generate(&GenerateRequest {
        prompt,
        timeout: config.codegen_timeout,
        output_limit_bytes: config.output_limit_bytes,
    }) {
        Ok(source) => source,
        Err(err) => return generation_failure(format!("{err:#}")),
    };
    if source.trim().is_empty() {
        return generation_failure("generator returned empty program text".to_string());
    }
    let candidate = Candidate { iteration, source };

    let outcome = executor
        .run(&ExecRequest {
            candidate: &candidate,
            document_path: &task.document_path,
            timeout: config.exec_timeout,
            output_limit_bytes: config.output_limit_bytes,
        })
        .unwrap_or_else(|err| {
            // Orchestrator-side faults also become a retryable record; a
            // half-finished iteration must never poison the loop.
            ExecutionOutcome::Failed(ExecFailure {
                kind: ExecFailureKind::Runtime,
                message: format!("executor error: {err:#}"),
                detail: None,
            })
        });
    let table = match outcome {
        ExecutionOutcome::Parsed(table) => table,
        ExecutionOutcome::Failed(failure) => {
            return IterationRecord {
                iteration,
                candidate,
                failure: Some(AttemptFailure::Execution(failure)),
            };
        }
    };

    let diff = diff::compare(&analysis.expected, &table);
    let failure = (!diff.is_empty()).then(|| AttemptFailure::Validation(diff));
    IterationRecord {
        iteration,
        candidate,
        failure,
    }
}
