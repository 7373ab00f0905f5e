//! Workflow configuration stored in `forge.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Loop configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to sensible
/// values; the retry bound and timeouts are configuration, not constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ForgeConfig {
    /// Maximum generate/execute/compare cycles per task.
    pub max_iterations: u32,

    /// Wall-clock budget for one code-generation call, in seconds.
    pub codegen_timeout_secs: u64,

    /// Wall-clock budget for one candidate execution, in seconds.
    pub exec_timeout_secs: u64,

    /// Truncate captured child stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Upper bound on the document text preview embedded in prompts.
    pub preview_limit_bytes: usize,

    pub codegen: CodegenConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodegenConfig {
    /// Agent CLI invoked for code generation. Receives the prompt on stdin
    /// and must print the program text on stdout.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interpreter used to run candidates (e.g. `["python3"]`).
    pub command: Vec<String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string()],
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            codegen_timeout_secs: 5 * 60,
            exec_timeout_secs: 2 * 60,
            output_limit_bytes: 100_000,
            preview_limit_bytes: 2048,
            codegen: CodegenConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl ForgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.codegen_timeout_secs == 0 {
            return Err(anyhow!("codegen_timeout_secs must be > 0"));
        }
        if self.exec_timeout_secs == 0 {
            return Err(anyhow!("exec_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.codegen.command.is_empty() || self.codegen.command[0].trim().is_empty() {
            return Err(anyhow!("codegen.command must be a non-empty array"));
        }
        if self.executor.command.is_empty() || self.executor.command[0].trim().is_empty() {
            return Err(anyhow!("executor.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ForgeConfig::default()`.
pub fn load_config(path: &Path) -> Result<ForgeConfig> {
    if !path.exists() {
        let cfg = ForgeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ForgeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ForgeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');

    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ForgeConfig::default());
        assert_eq!(cfg.max_iterations, 3);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("forge.toml");
        let cfg = ForgeConfig {
            max_iterations: 5,
            ..ForgeConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn validate_rejects_zero_iteration_budget() {
        let cfg = ForgeConfig {
            max_iterations: 0,
            ..ForgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_executor_command() {
        let cfg = ForgeConfig {
            executor: ExecutorConfig {
                command: Vec::new(),
            },
            ..ForgeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
