//! Prompt assembly for template-enforced generation.
//!
//! Prompt wording lives in `prompts/*.md` and is loaded at compile time; this
//! module only decides which pieces go together and in what order.
use crate::config::{Config, Mode};

const SYSTEM_RULES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/system_rules.md"
));
const NOTES_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/notes_template.md"
));
const MCQ_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/mcq_template.md"
));
const PYQ_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/pyq_template.md"
));
const CORRECTIVE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/corrective.md"
));
const SPACING_REPAIR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/spacing_repair.md"
));

/// Canonical template text for a mode.
pub fn template_for(mode: Mode) -> &'static str {
    match mode {
        Mode::Notes => NOTES_TEMPLATE,
        Mode::Mcq => MCQ_TEMPLATE,
        Mode::Pyq => PYQ_TEMPLATE,
    }
}

/// Build the first-attempt prompt for a question.
pub fn build(question: &str, config: &Config) -> String {
    let topic = config.topic.trim();
    let topic_line = if topic.is_empty() {
        String::new()
    } else {
        format!("Topic context: {topic}\n")
    };

    format!(
        "{rules}\n{topic_line}Mode: {mode}\nMarks: {marks} ({guidance})\n\n{template}\nUser question: {question}\n\nAnswer:",
        rules = SYSTEM_RULES,
        mode = config.mode,
        marks = config.marks,
        guidance = config.marks.length_guidance(),
        template = template_for(config.mode),
        question = question.trim(),
    )
}

/// Strengthen a base prompt for every attempt after the first.
pub fn build_corrective(base_prompt: &str) -> String {
    format!("{base_prompt}\n{CORRECTIVE}")
}

/// Prompt asking the backend to re-flow run-together text.
pub fn build_spacing_repair(text: &str) -> String {
    SPACING_REPAIR.replace("{text}", text)
}
