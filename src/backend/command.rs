//! Local command backend.
//!
//! Runs a user-configured command with the prompt on stdin and reads the
//! answer from stdout, so any local model runner (`ollama run`, `llm`, a
//! wrapper script) can stand in for the hosted router. Generation settings
//! are exported to the child as environment variables:
//!
//! - `ECON_MODEL`: current model id
//! - `ECON_TEMPERATURE`: sampling temperature
//! - `ECON_MAX_TOKENS`: token budget
use super::{
    compact_detail, retry_with_backoff, Backend, BackendError, CallOutcome, RetryPolicy,
    CALL_TIMEOUT,
};
use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const STDERR_MAX_CHARS: usize = 300;
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct CommandBackend {
    argv: Vec<String>,
    model: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl CommandBackend {
    /// Parse `command` with shell quoting rules.
    pub fn new(command: &str, model: String, retry: RetryPolicy) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self {
            argv,
            model,
            retry,
            timeout: CALL_TIMEOUT,
        })
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn call_once(&self, prompt: &str, max_tokens: u32, temperature: f32) -> CallOutcome {
        let start = Instant::now();
        let mut child = match Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .env("ECON_MODEL", &self.model)
            .env("ECON_TEMPERATURE", temperature.to_string())
            .env("ECON_MAX_TOKENS", max_tokens.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return CallOutcome::Fatal(BackendError::Command(format!(
                    "spawn {}: {err}",
                    self.argv[0]
                )))
            }
        };

        // Drain both pipes while polling so a chatty child cannot block on a full pipe.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        // A command that ignores stdin may exit before reading it.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(prompt.as_bytes()) {
                if err.kind() != ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    return CallOutcome::Fatal(BackendError::Command(format!(
                        "write prompt to LM stdin: {err}"
                    )));
                }
            }
        }

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if start.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return CallOutcome::Transient(format!(
                        "LM command timed out after {}s",
                        self.timeout.as_secs_f32()
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    let _ = child.kill();
                    return CallOutcome::Fatal(BackendError::Command(format!(
                        "wait for LM command: {err}"
                    )));
                }
            }
        };
        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = stdout.len(),
            "lm command complete"
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return CallOutcome::Transient(format!(
                "LM command exited with {}: {}",
                status,
                compact_detail(&stderr, STDERR_MAX_CHARS)
            ));
        }

        let text = String::from_utf8_lossy(&stdout).into_owned();
        if text.trim().is_empty() {
            return CallOutcome::Fatal(BackendError::EmptyResponse {
                model: self.model.clone(),
            });
        }
        CallOutcome::Success(text)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

impl Backend for CommandBackend {
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        retry_with_backoff(&self.retry, |_| {
            self.call_once(prompt, max_tokens, temperature)
        })
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
