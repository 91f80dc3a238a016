//! Append-only audit log of completed runs.
//!
//! One JSON object per line, written after a run finishes. Runs aborted by a
//! fatal backend error never reach the sink.
//!
//! ```jsonl
//! {"ts":"2026-10-18T09:12:44Z","model":"meta-llama/Llama-3.1-8B-Instruct","mode":"mcq","marks":5,...}
//! ```
use crate::config::{Config, Marks, Mode};
use crate::pipeline::Outcome;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// RFC 3339 UTC timestamp, second precision.
    pub ts: String,
    pub model: String,
    pub mode: Mode,
    pub marks: Marks,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub topic: String,
    pub question: String,
    pub answer: String,
    /// The answer came from the backend and passed validation.
    pub validated: bool,
    pub used_fallback: bool,
    pub attempts: u32,
}

impl AuditRecord {
    pub fn new(model: &str, config: &Config, question: &str, outcome: &Outcome) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            model: model.to_string(),
            mode: config.mode,
            marks: config.marks,
            topic: config.topic.clone(),
            question: question.to_string(),
            answer: outcome.final_text.clone(),
            validated: !outcome.used_fallback,
            used_fallback: outcome.used_fallback,
            attempts: outcome.attempts_made,
        }
    }
}

/// Destination for audit records. Append-only: no update, delete, or read.
pub trait AuditSink {
    fn append(&mut self, record: &AuditRecord) -> Result<()>;
}

/// Appends records to a JSONL file, creating parent directories on demand.
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&mut self, record: &AuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create audit log directory {}", parent.display()))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log for append: {}", self.path.display()))?;

        let line = serde_json::to_string(record).context("serialize audit record")?;
        writeln!(file, "{line}").context("write audit record")?;
        Ok(())
    }
}

/// Sink used when no audit log is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&mut self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// JSONL sink when a path is configured, otherwise a no-op sink.
pub fn sink_for(path: Option<PathBuf>) -> Box<dyn AuditSink> {
    match path {
        Some(path) => {
            let sink = JsonlAuditSink::new(path);
            tracing::debug!(path = %sink.path().display(), "audit log enabled");
            Box::new(sink)
        }
        None => Box::new(NullAuditSink),
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::{AuditRecord, AuditSink};
    use anyhow::Result;

    /// Sink that keeps records in memory for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySink {
        pub records: Vec<AuditRecord>,
    }

    impl AuditSink for MemorySink {
        fn append(&mut self, record: &AuditRecord) -> Result<()> {
            self.records.push(record.clone());
            Ok(())
        }
    }
}
