//! Template-enforced generation.
//!
//! A run makes up to [`MAX_ATTEMPTS`] backend calls. The first uses the plain
//! prompt at the mode's base temperature; every later attempt appends a
//! corrective directive and drops to temperature 0. Each response is
//! normalized, re-flowed once if it looks glued, trimmed to the template's
//! first heading, and validated. The first conforming response wins. If none
//! conforms, the run ends with the mode's deterministic fallback document.
//!
//! A fatal backend error on a generation call aborts the run without an
//! answer or an audit record. A failed spacing repair only costs the attempt.
use crate::audit::{AuditRecord, AuditSink};
use crate::backend::{Backend, BackendError};
use crate::config::{Config, Mode};
use crate::fallback::fallback;
use crate::prompts;
use crate::text::{normalize, repair_spacing, trim_to_anchor, GluedThresholds};
use crate::validate::{missing_requirements, validate};
use anyhow::Result;

/// Backend calls allowed per run before falling back (repair calls excluded).
pub const MAX_ATTEMPTS: u32 = 5;

/// One user turn, fixed before the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub question: String,
    pub mode: Mode,
    pub prompt: String,
    pub max_tokens: u32,
    pub base_temperature: f32,
}

impl Request {
    pub fn new(question: &str, config: &Config) -> Self {
        Self {
            question: question.trim().to_string(),
            mode: config.mode,
            prompt: prompts::build(question, config),
            max_tokens: config.mode.max_tokens(config.marks),
            base_temperature: config.mode.base_temperature(),
        }
    }

    /// Temperature for the 1-based `attempt`.
    pub fn temperature_for(&self, attempt: u32) -> f32 {
        if attempt <= 1 {
            self.base_temperature
        } else {
            0.0
        }
    }

    /// Prompt for the 1-based `attempt`.
    pub fn prompt_for(&self, attempt: u32) -> String {
        if attempt <= 1 {
            self.prompt.clone()
        } else {
            prompts::build_corrective(&self.prompt)
        }
    }
}

/// Terminal value of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub final_text: String,
    pub used_fallback: bool,
    pub attempts_made: u32,
}

/// Drives the attempt loop for one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Enforcer {
    pub glued: GluedThresholds,
}

impl Enforcer {
    /// Run the attempt loop. `subject` names the topic for the fallback.
    pub fn enforce(
        &self,
        backend: &mut dyn Backend,
        request: &Request,
        subject: &str,
    ) -> Result<Outcome, BackendError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let temperature = request.temperature_for(attempt);
            let prompt = request.prompt_for(attempt);
            tracing::debug!(attempt, temperature, mode = %request.mode, "generation attempt");

            let raw = backend.generate(&prompt, request.max_tokens, temperature)?;
            let mut text = normalize(&raw);
            if self.glued.looks_glued(&text) {
                tracing::info!(attempt, "response looks glued; requesting spacing repair");
                text = repair_spacing(&text, backend, request.max_tokens);
            }
            let text = trim_to_anchor(request.mode, &text);

            if validate(request.mode, &text) {
                tracing::info!(attempt, mode = %request.mode, "response conforms to template");
                return Ok(Outcome {
                    final_text: text,
                    used_fallback: false,
                    attempts_made: attempt,
                });
            }
            tracing::debug!(
                attempt,
                missing = ?missing_requirements(request.mode, &text),
                "response rejected"
            );
        }

        tracing::warn!(
            attempts = MAX_ATTEMPTS,
            mode = %request.mode,
            "no conforming response; using fallback document"
        );
        Ok(Outcome {
            final_text: fallback(request.mode, subject),
            used_fallback: true,
            attempts_made: MAX_ATTEMPTS,
        })
    }
}

/// Answer one question and audit the completed run.
///
/// A fatal backend error is returned as-is (downcastable to
/// [`BackendError`]) and nothing is audited. An audit write failure is
/// logged and does not discard the answer.
pub fn run(
    backend: &mut dyn Backend,
    sink: &mut dyn AuditSink,
    question: &str,
    config: &Config,
) -> Result<Outcome> {
    let request = Request::new(question, config);
    let outcome = Enforcer::default().enforce(backend, &request, &request.question)?;

    let record = AuditRecord::new(backend.model_id(), config, &request.question, &outcome);
    if let Err(err) = sink.append(&record) {
        tracing::warn!(error = %format!("{err:#}"), "failed to append audit record");
    }
    Ok(outcome)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
