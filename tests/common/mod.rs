//! Shared test infrastructure for integration tests.
//!
//! `MockLm` writes a small shell script into a temp directory and hands it to
//! `econ` as the local LM command. The script records every prompt it
//! receives and replies with `response_<n>.txt` for the n-th call, falling
//! back to `response_default.txt`.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const MOCK_LM_SCRIPT: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
n=$(cat "$dir/count" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$dir/count"
cat > "$dir/prompt_$n.txt"
if [ -f "$dir/response_$n.txt" ]; then
  cat "$dir/response_$n.txt"
else
  cat "$dir/response_default.txt"
fi
"#;

/// Scripted local LM backend plus a scratch directory for audit logs.
pub struct MockLm {
    dir: TempDir,
}

impl MockLm {
    /// Mock that answers every call with `reply`.
    pub fn always(reply: &str) -> Self {
        let dir = tempfile::tempdir().expect("create mock LM dir");
        fs::write(dir.path().join("mock_lm.sh"), MOCK_LM_SCRIPT).expect("write mock script");
        fs::write(dir.path().join("response_default.txt"), reply).expect("write default reply");
        Self { dir }
    }

    /// Override the reply for the 1-based call `n`.
    pub fn reply_on(self, n: u32, reply: &str) -> Self {
        fs::write(self.dir.path().join(format!("response_{n}.txt")), reply)
            .expect("write scripted reply");
        self
    }

    pub fn command(&self) -> String {
        let script = self.dir.path().join("mock_lm.sh");
        format!("sh {}", shell_words::quote(&script.to_string_lossy()))
    }

    /// Number of LM calls made so far.
    pub fn calls(&self) -> u32 {
        fs::read_to_string(self.dir.path().join("count"))
            .ok()
            .and_then(|count| count.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Prompt received by the 1-based call `n`.
    pub fn prompt(&self, n: u32) -> String {
        fs::read_to_string(self.dir.path().join(format!("prompt_{n}.txt"))).expect("read prompt")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.dir.path().join("logs").join("econ.jsonl")
    }

    /// Audit records written so far, one JSON value per line.
    pub fn audit_records(&self) -> Vec<serde_json::Value> {
        let Ok(content) = fs::read_to_string(self.audit_log_path()) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("audit line is JSON"))
            .collect()
    }

    /// Base `econ` invocation wired to this mock and its audit log.
    pub fn econ(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_econ"));
        command
            .env_remove("ECON_BOT_LOG")
            .env_remove("ECON_LM_COMMAND")
            .env_remove("ECON_LOG")
            .env_remove("HF_MODEL")
            .arg("--lm-command")
            .arg(self.command())
            .arg("--log")
            .arg(self.audit_log_path());
        command
    }
}

/// Run `econ` with `stdin` piped in and capture its output.
pub fn run_with_stdin(mut command: Command, stdin: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn econ");
    child
        .stdin
        .take()
        .expect("econ stdin")
        .write_all(stdin.as_bytes())
        .expect("write econ stdin");
    child.wait_with_output().expect("wait for econ")
}
