//! Session and environment configuration.
//!
//! `Config` is the per-turn value the session hands to the pipeline: it is
//! built once per request and never mutated while a run is in flight.
//! `EnvConfig` captures the process environment once at start-up so the
//! rest of the program never reads `std::env` directly.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ROUTER_BASE_URL: &str = "https://router.huggingface.co/v1";

/// Output template a request must conform to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Structured revision notes.
    #[default]
    Notes,
    /// Five multiple-choice questions with an answer key.
    Mcq,
    /// Past-year-question exam guidance.
    Pyq,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Notes, Mode::Mcq, Mode::Pyq];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Notes => "notes",
            Mode::Mcq => "mcq",
            Mode::Pyq => "pyq",
        }
    }

    /// Lowercase heading that opens the mode's template.
    pub fn anchor(self) -> &'static str {
        match self {
            Mode::Notes => "key terms:",
            Mode::Mcq => "mcqs:",
            Mode::Pyq => "how to structure the answer",
        }
    }

    /// Token budget for one generation in this mode.
    ///
    /// Notes scale with the marks asked; the other templates have a fixed
    /// shape and get the largest budget.
    pub fn max_tokens(self, marks: Marks) -> u32 {
        match (self, marks) {
            (Mode::Notes, Marks::Two) => 260,
            (Mode::Notes, Marks::Five) => 360,
            (Mode::Notes, Marks::Ten) => 520,
            (Mode::Mcq, _) | (Mode::Pyq, _) => 520,
        }
    }

    /// Temperature used on the first attempt of a run.
    pub fn base_temperature(self) -> f32 {
        match self {
            Mode::Notes => 0.15,
            Mode::Mcq => 0.10,
            Mode::Pyq => 0.15,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let wanted = raw.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| anyhow!("mode must be notes, mcq, or pyq (got {wanted:?})"))
    }
}

/// Marks weighting of the question; only 2, 5 and 10 are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Marks {
    Two,
    Five,
    Ten,
}

impl Marks {
    pub fn value(self) -> u8 {
        match self {
            Marks::Two => 2,
            Marks::Five => 5,
            Marks::Ten => 10,
        }
    }

    pub fn length_guidance(self) -> &'static str {
        match self {
            Marks::Two => "Length guidance: very short (3-6 lines).",
            Marks::Five => "Length guidance: medium (10-14 lines).",
            Marks::Ten => "Length guidance: long (3-6 short paragraphs).",
        }
    }
}

impl From<Marks> for u8 {
    fn from(marks: Marks) -> u8 {
        marks.value()
    }
}

impl TryFrom<u8> for Marks {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(Marks::Two),
            5 => Ok(Marks::Five),
            10 => Ok(Marks::Ten),
            other => Err(anyhow!("marks must be 2, 5, or 10 (got {other})")),
        }
    }
}

impl FromStr for Marks {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let value: u8 = raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("marks must be a number: 2|5|10 (got {raw:?})"))?;
        Marks::try_from(value)
    }
}

impl fmt::Display for Marks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Per-turn request settings owned by the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub marks: Marks,
    /// Optional topic-context line; blank means none.
    pub topic: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            marks: Marks::Five,
            topic: String::new(),
        }
    }
}

/// Start-up settings read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub hf_token: Option<String>,
    pub hf_model: Option<String>,
    pub hf_base_url: String,
    pub lm_command: Option<String>,
    pub audit_log: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            hf_token: get("HF_TOKEN"),
            hf_model: get("HF_MODEL"),
            hf_base_url: get("HF_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ROUTER_BASE_URL.to_string()),
            lm_command: get("ECON_LM_COMMAND"),
            audit_log: get("ECON_BOT_LOG").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
