//! Code-generation client abstraction.
//!
//! [`CodegenClient`] decouples the repair loop from the agent backend. One
//! request/response per generation round, no streaming. Tests use scripted
//! clients that return canned program text without spawning processes.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_with_timeout;

/// Parameters for one generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Full prompt, including corrective feedback on repair rounds.
    pub prompt: String,
    /// Maximum time to wait for the generator.
    pub timeout: Duration,
    /// Truncate captured generator output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over code-generation backends.
pub trait CodegenClient {
    /// Return a candidate program text for the given prompt.
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Client that spawns a configured agent CLI.
///
/// The prompt is fed on stdin; stdout is taken as the program text. If the
/// generator wraps its answer in a Markdown code fence, the fence is
/// stripped.
pub struct CommandCodegen {
    command: Vec<String>,
}

impl CommandCodegen {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl CodegenClient for CommandCodegen {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("codegen command is empty"))?;
        info!(command = %program, "invoking code generator");

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]);
        let output = run_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run code generator")?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "generator timed out");
            return Err(anyhow!(
                "code generator timed out after {:?}",
                request.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "code generator exited with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(5)
            ));
        }

        let text = strip_code_fence(&output.stdout_lossy());
        if text.trim().is_empty() {
            return Err(anyhow!("code generator returned empty program text"));
        }
        debug!(bytes = text.len(), "generator returned program text");
        Ok(text)
    }
}

/// Strip the first Markdown code fence if the answer is wrapped in one,
/// otherwise return the trimmed text unchanged.
pub fn strip_code_fence(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*\r?\n(.*?)```").unwrap()
    });
    match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or("").trim().to_string(),
        None => text.trim().to_string(),
    }
}
