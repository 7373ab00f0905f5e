//! Prompt rendering for the code generator.
//!
//! One template covers both the first attempt and repair rounds; the repair
//! round adds the prior candidate and its failure rendering as corrective
//! feedback.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::io::analysis::TaskAnalysis;

const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");

/// Cap on the feedback text quoted back into the prompt. Diffs and stderr
/// tails can be large; the generator only needs the leading mismatches.
const FEEDBACK_LIMIT: usize = 16 * 1024;

/// The previous attempt, quoted in repair prompts.
#[derive(Debug, Clone, Serialize)]
pub struct PriorAttempt {
    pub source: String,
    pub failure: String,
}

/// Inputs for one prompt rendering.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub target: &'a str,
    pub analysis: &'a TaskAnalysis,
    /// `None` on the first iteration.
    pub prior: Option<PriorAttempt>,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        Self { env }
    }

    /// Render the generation prompt for one iteration.
    pub fn render_generate(&self, inputs: &PromptInputs<'_>) -> Result<String> {
        let prior = inputs.prior.as_ref().map(|p| PriorAttempt {
            source: p.source.clone(),
            failure: truncate(&p.failure, FEEDBACK_LIMIT),
        });
        let template = self.env.get_template("generate")?;
        let rendered = template
            .render(context! {
                target => inputs.target,
                columns => inputs.analysis.expected.columns,
                row_count => inputs.analysis.expected.rows.len(),
                sample_block => sample_block(inputs.analysis),
                document_name => inputs.analysis.document_name,
                document_size => inputs.analysis.document_size,
                preview => inputs.analysis.document_preview.trim(),
                prior => prior,
            })
            .context("render generation prompt")?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote the expected header and sample rows as CSV-ish lines.
fn sample_block(analysis: &TaskAnalysis) -> String {
    let mut lines = vec![analysis.expected.columns.join(",")];
    for row in &analysis.sample_rows {
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[truncated {} bytes]", &text[..end], text.len() - end)
}
