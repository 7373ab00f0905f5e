//! Parser-forging CLI.
//!
//! `forge run` drives the generate-test-repair loop for each target: it
//! resolves the target's document and ground-truth CSV under the data
//! directory, runs the loop, and writes the passing parser to the output
//! directory. Failures print the complete ordered account of every attempt.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};

use forge::core::types::{IterationRecord, StopReason, Task, WorkflowResult};
use forge::exit_codes;
use forge::io::codegen::CommandCodegen;
use forge::io::config::{ForgeConfig, load_config, write_config};
use forge::io::executor::PythonExecutor;
use forge::logging;
use forge::workflow::{WorkflowConfig, run_workflow};

#[derive(Parser)]
#[command(
    name = "forge",
    version,
    about = "Bounded generate-test-repair loop for tabular data extractors"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate, test, and repair a parser for each target.
    Run {
        /// Target format/source name (repeatable), e.g. `icici`.
        #[arg(short, long, required = true)]
        target: Vec<String>,
        /// Directory holding `<target>/<document>.pdf` and `<target>/result.csv`.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Directory where passing parsers are written.
        #[arg(long, default_value = "custom_parsers")]
        out_dir: PathBuf,
        /// Config file; defaults apply when it is missing.
        #[arg(long, default_value = "forge.toml")]
        config: PathBuf,
        /// Override the configured iteration budget.
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Write a default forge.toml.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = "forge.toml")]
        config: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            target,
            data_dir,
            out_dir,
            config,
            max_iterations,
        } => cmd_run(&target, &data_dir, &out_dir, &config, max_iterations),
        Command::Init { force, config } => cmd_init(&config, force),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    write_config(config_path, &ForgeConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(
    targets: &[String],
    data_dir: &Path,
    out_dir: &Path,
    config_path: &Path,
    max_iterations: Option<u32>,
) -> Result<i32> {
    let mut cfg = load_config(config_path)?;
    if let Some(n) = max_iterations {
        cfg.max_iterations = n;
        cfg.validate()?;
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    let handler_flag = cancelled.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .context("install ctrl-c handler")?;

    let codegen = CommandCodegen::new(cfg.codegen.command.clone());
    let executor = PythonExecutor::new(cfg.executor.command.clone());
    let workflow_config = WorkflowConfig::from_config(&cfg, Path::new("."));

    let mut exit = exit_codes::OK;
    for target in targets {
        let task = match resolve_task(data_dir, target) {
            Ok(task) => task,
            Err(stop) => {
                print_failure_report(target, &[], &stop);
                exit = exit.max(code_for(&stop));
                continue;
            }
        };
        println!(
            "{target}: document {} (budget {} iteration(s))",
            task.document_path.display(),
            workflow_config.max_iterations
        );

        let result = run_workflow(
            &task,
            &codegen,
            &executor,
            &workflow_config,
            &cancelled,
            |record| println!("{target}: {}", render_progress(record)),
        )?;

        match result {
            WorkflowResult::Solved {
                candidate,
                iterations,
            } => {
                let out_path = out_dir.join(format!("{target}_parser.py"));
                fs::create_dir_all(out_dir)
                    .with_context(|| format!("create {}", out_dir.display()))?;
                fs::write(&out_path, &candidate.source)
                    .with_context(|| format!("write {}", out_path.display()))?;
                println!(
                    "{target}: solved in {iterations} iteration(s), parser written to {}",
                    out_path.display()
                );
            }
            WorkflowResult::Failed { records, stop } => {
                print_failure_report(target, &records, &stop);
                exit = exit.max(code_for(&stop));
                if stop == StopReason::Cancelled {
                    break;
                }
            }
        }
    }
    Ok(exit)
}

/// Build the task for one target: first PDF in the target's data directory
/// plus `result.csv` next to it. A target without a usable document is an
/// unusable task, reported like any other per-target failure so the
/// remaining targets still run. The expected file's readability is checked
/// by the workflow itself.
fn resolve_task(data_dir: &Path, target: &str) -> std::result::Result<Task, StopReason> {
    let dir = data_dir.join(target);
    match find_document(&dir) {
        Ok(document_path) => Ok(Task {
            target: target.to_string(),
            document_path,
            expected_path: dir.join("result.csv"),
        }),
        Err(err) => Err(StopReason::MalformedTask(format!("{err:#}"))),
    }
}

fn find_document(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))?;
    let mut documents: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    documents.sort();
    documents
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no PDF document found in {}", dir.display()))
}

fn render_progress(record: &IterationRecord) -> String {
    match &record.failure {
        None => format!("iteration {}: pass", record.iteration),
        Some(failure) => format!(
            "iteration {}: fail ({}): {}",
            record.iteration,
            failure.kind(),
            first_line(&failure.render())
        ),
    }
}

/// Every attempt and why it failed, most recent cause in full.
fn print_failure_report(target: &str, records: &[IterationRecord], stop: &StopReason) {
    match stop {
        StopReason::MalformedTask(message) => {
            eprintln!("{target}: task is unusable: {message}");
            return;
        }
        StopReason::Exhausted => {
            eprintln!(
                "{target}: no passing parser after {} attempt(s):",
                records.len()
            );
        }
        StopReason::Cancelled => {
            eprintln!("{target}: cancelled after {} attempt(s):", records.len());
        }
    }
    for record in records {
        eprintln!("  {}", render_progress(record));
    }
    if let Some(failure) = records.last().and_then(|r| r.failure.as_ref()) {
        eprintln!("last failure in full:");
        for line in failure.render().lines() {
            eprintln!("  {line}");
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn code_for(stop: &StopReason) -> i32 {
    match stop {
        StopReason::MalformedTask(_) => exit_codes::INVALID,
        StopReason::Exhausted => exit_codes::EXHAUSTED,
        StopReason::Cancelled => exit_codes::CANCELLED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge::core::types::{AttemptFailure, Candidate};

    #[test]
    fn parse_run_with_multiple_targets() {
        let cli = Cli::parse_from(["forge", "run", "-t", "icici", "-t", "sbi"]);
        let Command::Run {
            target,
            max_iterations,
            ..
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(target, vec!["icici", "sbi"]);
        assert_eq!(max_iterations, None);
    }

    #[test]
    fn parse_run_with_iteration_override() {
        let cli = Cli::parse_from(["forge", "run", "-t", "icici", "--max-iterations", "5"]);
        let Command::Run { max_iterations, .. } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(max_iterations, Some(5));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["forge", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }

    #[test]
    fn find_document_picks_first_pdf_lexicographically() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("b.pdf"), b"x").expect("write");
        fs::write(temp.path().join("a.pdf"), b"x").expect("write");
        fs::write(temp.path().join("result.csv"), b"x").expect("write");

        let document = find_document(temp.path()).expect("find");
        assert!(document.ends_with("a.pdf"));
    }

    #[test]
    fn find_document_errors_when_none_present() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = find_document(temp.path()).unwrap_err();
        assert!(err.to_string().contains("no PDF document"));
    }

    #[test]
    fn target_without_document_resolves_to_per_target_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("empty")).expect("mkdir");

        let stop = resolve_task(temp.path(), "empty").unwrap_err();
        let StopReason::MalformedTask(message) = &stop else {
            panic!("expected malformed task, got {stop:?}");
        };
        assert!(message.contains("no PDF document"));
        // Flows through the same report/exit path as a workflow failure, so
        // a multi-target run keeps going past it.
        assert_eq!(code_for(&stop), exit_codes::INVALID);
    }

    #[test]
    fn progress_line_names_the_failure_kind() {
        let record = IterationRecord {
            iteration: 2,
            candidate: Candidate {
                iteration: 2,
                source: "x".to_string(),
            },
            failure: Some(AttemptFailure::Generation("model unavailable".to_string())),
        };
        let line = render_progress(&record);
        assert!(line.contains("iteration 2"));
        assert!(line.contains("generation"));
        assert!(line.contains("model unavailable"));
    }

    #[test]
    fn stop_reasons_map_to_stable_exit_codes() {
        assert_eq!(
            code_for(&StopReason::MalformedTask("x".to_string())),
            exit_codes::INVALID
        );
        assert_eq!(code_for(&StopReason::Exhausted), exit_codes::EXHAUSTED);
        assert_eq!(code_for(&StopReason::Cancelled), exit_codes::CANCELLED);
    }
}
