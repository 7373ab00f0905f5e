//! Append-only audit artifacts under `.forge/attempts/`.
//!
//! One directory per attempt, written after the attempt resolves and never
//! mutated afterwards. Independent of `RUST_LOG`: these are product output,
//! not diagnostics.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::IterationRecord;

#[derive(Debug, Clone, Serialize)]
pub struct AttemptMeta<'a> {
    pub target: &'a str,
    pub iteration: u32,
    pub verdict: &'a str,
    pub failure_kind: Option<&'a str>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AttemptPaths {
    pub dir: PathBuf,
    pub candidate_path: PathBuf,
    pub meta_path: PathBuf,
    pub failure_path: PathBuf,
}

impl AttemptPaths {
    pub fn new(root: &Path, target: &str, iteration: u32) -> Self {
        let dir = root
            .join(".forge")
            .join("attempts")
            .join(target)
            .join(iteration.to_string());
        Self {
            candidate_path: dir.join("candidate.py"),
            meta_path: dir.join("meta.json"),
            failure_path: dir.join("failure.txt"),
            dir,
        }
    }
}

/// Persist one attempt's artifacts: candidate source, metadata, and (on
/// failure) the rendered failure used as feedback.
pub fn write_attempt(
    root: &Path,
    target: &str,
    record: &IterationRecord,
    duration_ms: u64,
) -> Result<AttemptPaths> {
    let paths = AttemptPaths::new(root, target, record.iteration);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create attempt dir {}", paths.dir.display()))?;

    write_text(&paths.candidate_path, &record.candidate.source)?;

    let meta = AttemptMeta {
        target,
        iteration: record.iteration,
        verdict: if record.passed() { "pass" } else { "fail" },
        failure_kind: record.failure.as_ref().map(|f| f.kind()),
        duration_ms,
    };
    let mut buf = serde_json::to_string_pretty(&meta).context("serialize attempt meta")?;
    buf.push('\n');
    write_text(&paths.meta_path, &buf)?;

    if let Some(failure) = &record.failure {
        write_text(&paths.failure_path, &failure.render())?;
    }

    Ok(paths)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
