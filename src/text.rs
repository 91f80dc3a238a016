//! Text clean-up applied to every backend response before validation.
//!
//! Three passes run in order: `normalize` strips reasoning blocks and
//! canonicalizes whitespace, `repair_spacing` re-flows run-together output
//! when `looks_glued` fires, and `trim_to_anchor` drops any conversational
//! preamble ahead of the template's first heading.
use crate::backend::Backend;
use crate::config::Mode;
use crate::prompts;
use regex::Regex;
use std::sync::LazyLock;

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>").expect("Invalid think block regex")
});
static UNTERMINATED_THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*$").expect("Invalid think tail regex"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n(?:[ \t]*\n){3,}").expect("Invalid blank line run regex")
});
static NOTES_ANCHOR: LazyLock<Regex> = LazyLock::new(|| anchor_regex(Mode::Notes));
static MCQ_ANCHOR: LazyLock<Regex> = LazyLock::new(|| anchor_regex(Mode::Mcq));
static PYQ_ANCHOR: LazyLock<Regex> = LazyLock::new(|| anchor_regex(Mode::Pyq));

/// Remove reasoning blocks and canonicalize whitespace.
///
/// An opening `<think>` without a matching close swallows the rest of the
/// text. Runs of three or more blank lines collapse to one. Applying this to
/// its own output is a no-op.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let without_blocks = THINK_BLOCK.replace_all(&unified, "");
    let without_tail = UNTERMINATED_THINK.replace(&without_blocks, "");
    let collapsed = BLANK_RUN.replace_all(&without_tail, "\n\n");
    collapsed.trim().to_string()
}

/// Tuning for the run-together text heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GluedThresholds {
    /// Alphabetic characters required before the check applies at all.
    pub min_alphabetic: usize,
    /// Expected alphabetic characters per space in ordinary prose.
    pub alphabetic_per_space: usize,
    /// Floor on the expected space count.
    pub min_spaces: usize,
}

impl Default for GluedThresholds {
    fn default() -> Self {
        Self {
            min_alphabetic: 120,
            alphabetic_per_space: 80,
            min_spaces: 10,
        }
    }
}

impl GluedThresholds {
    pub fn looks_glued(&self, text: &str) -> bool {
        let alphabetic = text.chars().filter(|ch| ch.is_alphabetic()).count();
        if alphabetic <= self.min_alphabetic {
            return false;
        }
        let spaces = text.chars().filter(|ch| *ch == ' ').count();
        // Fractional ratio: glued when spaces < max(min_spaces, alphabetic / per_space).
        spaces < self.min_spaces || spaces * self.alphabetic_per_space.max(1) < alphabetic
    }
}

/// Ask the backend once, at temperature 0, to reinsert spacing.
///
/// The repaired text is normalized before it is returned. A failed repair
/// call is not retried here: the input comes back unchanged so validation
/// rejects it and the attempt loop moves on.
pub fn repair_spacing(text: &str, backend: &mut dyn Backend, max_tokens: u32) -> String {
    let prompt = prompts::build_spacing_repair(text);
    match backend.generate(&prompt, max_tokens, 0.0) {
        Ok(repaired) => normalize(&repaired),
        Err(err) => {
            tracing::warn!(error = %err, "spacing repair failed; keeping original text");
            text.to_string()
        }
    }
}

/// Slice from the first case-insensitive occurrence of the mode's anchor.
///
/// Returns the input unchanged when the anchor is absent.
pub fn trim_to_anchor(mode: Mode, text: &str) -> String {
    let anchor = match mode {
        Mode::Notes => &*NOTES_ANCHOR,
        Mode::Mcq => &*MCQ_ANCHOR,
        Mode::Pyq => &*PYQ_ANCHOR,
    };
    match anchor.find(text) {
        Some(found) => text[found.start()..].trim().to_string(),
        None => text.to_string(),
    }
}

fn anchor_regex(mode: Mode) -> Regex {
    Regex::new(&format!("(?i){}", regex::escape(mode.anchor()))).expect("Invalid anchor regex")
}
