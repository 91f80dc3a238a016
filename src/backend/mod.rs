//! Text-generation backends.
//!
//! A backend turns a prompt into text. Implementations make a single upstream
//! call per attempt and report it as a [`CallOutcome`]; [`retry_with_backoff`]
//! absorbs transient outcomes so callers only ever see a finished answer or a
//! fatal [`BackendError`].
//!
//! Two implementations ship:
//!
//! - [`RouterBackend`]: hosted OpenAI-compatible chat completions over HTTPS.
//! - [`CommandBackend`]: a user-configured local command (prompt on stdin,
//!   answer on stdout), e.g. `ollama run llama3.2:1b`.
mod command;
mod router;

pub use command::CommandBackend;
pub use router::RouterBackend;

use crate::config::EnvConfig;
use anyhow::{anyhow, Result};
use std::time::Duration;
use thiserror::Error;

/// Wall-clock ceiling for a single backend call.
pub(crate) const CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Capabilities every generation backend provides.
pub trait Backend {
    /// Generate text for `prompt`. Transient upstream failures are retried
    /// internally; an `Err` means retrying will not help.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError>;

    /// Switch the model used by subsequent calls.
    fn set_model(&mut self, model: &str);

    /// Model used by the next call.
    fn model_id(&self) -> &str;
}

/// Non-retryable backend failure. Aborts the run that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("authentication rejected ({status}): {detail}")]
    Unauthorized { status: u16, detail: String },

    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("empty response from model {model}; try a different model")]
    EmptyResponse { model: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("LM command failed: {0}")]
    Command(String),

    #[error("backend failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Result of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(String),
    /// Retryable condition (rate limit, unavailable, timeout) with a diagnostic.
    Transient(String),
    Fatal(BackendError),
}

/// Capped exponential backoff between upstream attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy with the default attempt ceiling and no sleeping.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay after the zero-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `call` until it succeeds, fails fatally, or exhausts the policy.
///
/// `call` receives the zero-based attempt number.
pub fn retry_with_backoff<F>(policy: &RetryPolicy, mut call: F) -> Result<String, BackendError>
where
    F: FnMut(u32) -> CallOutcome,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = String::from("no attempt made");
    for attempt in 0..attempts {
        match call(attempt) {
            CallOutcome::Success(text) => return Ok(text),
            CallOutcome::Fatal(err) => return Err(err),
            CallOutcome::Transient(detail) => {
                tracing::warn!(attempt = attempt + 1, attempts, %detail, "transient backend failure");
                last = detail;
                if attempt + 1 < attempts {
                    let delay = policy.delay_after(attempt);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
    Err(BackendError::RetriesExhausted { attempts, last })
}

/// Collapse whitespace and cap the length of an upstream diagnostic.
pub(crate) fn compact_detail(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Pick the backend the environment asks for.
///
/// A configured local command wins over the hosted router.
pub fn from_env_config(env: &EnvConfig) -> Result<Box<dyn Backend>> {
    if let Some(command) = env.lm_command.as_deref() {
        let model = env.hf_model.clone().unwrap_or_else(|| "local".to_string());
        let backend = CommandBackend::new(command, model, RetryPolicy::default())?;
        return Ok(Box::new(backend));
    }
    let token = env
        .hf_token
        .clone()
        .ok_or_else(|| anyhow!("HF_TOKEN is not set; export it or pass --lm-command"))?;
    let model = env
        .hf_model
        .clone()
        .ok_or_else(|| anyhow!("HF_MODEL is not set; export it or pass --lm-command"))?;
    let backend = RouterBackend::new(token, model, env.hf_base_url.clone(), RetryPolicy::default())?;
    Ok(Box::new(backend))
}
