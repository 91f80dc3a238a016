//! Deterministic documents used when the backend never produces a
//! conforming answer.
//!
//! Each document is hand-written to the same shape the validator demands, so
//! a fallback answer is indistinguishable in structure from a generated one.
use crate::config::Mode;

const NOTES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/fallback_notes.md"
));
const MCQ: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/fallback_mcq.md"
));
const PYQ: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/fallback_pyq.md"
));

const UNNAMED_TOPIC: &str = "this topic";

/// Topic-parameterized fallback for `mode`. Pure; no backend involved.
pub fn fallback(mode: Mode, topic: &str) -> String {
    let topic = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    let topic = if topic.is_empty() {
        UNNAMED_TOPIC
    } else {
        topic.as_str()
    };
    let document = match mode {
        Mode::Notes => NOTES,
        Mode::Mcq => MCQ,
        Mode::Pyq => PYQ,
    };
    document.replace("{topic}", topic).trim().to_string()
}
