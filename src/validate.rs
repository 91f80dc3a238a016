//! Structural conformance checks for each output template.
//!
//! Every check is a case-insensitive presence or pattern test over the whole
//! text, so sections may appear in any order. Wording is not judged; a
//! correct answer under a renamed heading is rejected like a malformed one.
use crate::config::Mode;
use regex::Regex;
use std::sync::LazyLock;

const NOTES_SECTIONS: [&str; 4] = ["key terms:", "core points:", "diagram:", "exam questions:"];
const NOTES_NUMBERED: [&str; 3] = ["1.", "2.", "3."];
const NOTES_PAREN: [&str; 3] = ["1)", "2)", "3)"];
const BULLET: &str = "- ";

const MCQ_SECTIONS: [&str; 2] = ["mcqs:", "answer key:"];
const MCQ_ITEMS: [&str; 5] = ["1.", "2.", "3.", "4.", "5."];
const MCQ_OPTIONS: [&str; 4] = ["a)", "b)", "c)", "d)"];

const PYQ_SECTIONS: [&str; 4] = [
    "how to structure the answer (intro/body/conclusion):",
    "key points to include:",
    "common examiner expectations:",
    "2 sample past-year style questions:",
];
const PYQ_QUESTIONS: [&str; 2] = ["1)", "2)"];

static ANSWER_KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)answer key:\s*1-[A-D],\s*2-[A-D],\s*3-[A-D],\s*4-[A-D],\s*5-[A-D]",
    )
    .expect("Invalid answer key regex")
});

/// Whether `text` satisfies every structural check for `mode`.
pub fn validate(mode: Mode, text: &str) -> bool {
    missing_requirements(mode, text).is_empty()
}

/// Describe every structural check `text` fails for `mode`.
///
/// Only used for diagnostics; the retry loop consumes the boolean.
pub fn missing_requirements(mode: Mode, text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut missing = Vec::new();
    match mode {
        Mode::Notes => {
            require_all(&lower, &NOTES_SECTIONS, "section", &mut missing);
            require_all(&lower, &NOTES_NUMBERED, "numbered marker", &mut missing);
            require_all(&lower, &NOTES_PAREN, "question marker", &mut missing);
            require_all(&lower, &[BULLET], "bullet", &mut missing);
        }
        Mode::Mcq => {
            require_all(&lower, &MCQ_SECTIONS, "section", &mut missing);
            require_all(&lower, &MCQ_ITEMS, "question number", &mut missing);
            require_all(&lower, &MCQ_OPTIONS, "option marker", &mut missing);
            if !ANSWER_KEY_LINE.is_match(text) {
                missing.push("answer key line (1-X, 2-X, 3-X, 4-X, 5-X)".to_string());
            }
        }
        Mode::Pyq => {
            require_all(&lower, &PYQ_SECTIONS, "section", &mut missing);
            require_all(&lower, &PYQ_QUESTIONS, "question marker", &mut missing);
        }
    }
    missing
}

fn require_all(lower: &str, needles: &[&str], label: &str, missing: &mut Vec<String>) {
    for needle in needles {
        if !lower.contains(needle) {
            missing.push(format!("{label} {needle:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_OK: &str = "Key Terms:\n- Inflation: rising prices\n\nCore Points:\n1. One\n2. Two\n3. Three\n\nDiagram:\nAD shifts right\n\nExam Questions:\n1) Define it\n2) Explain it\n3) Evaluate it";

    const MCQ_OK: &str = "MCQs:\n1. Q\na) w\nb) x\nc) y\nd) z\n2. Q\n3. Q\n4. Q\n5. Q\n\nAnswer Key:\n1-A, 2-b, 3-C, 4-D, 5-A";

    const PYQ_OK: &str = "How to structure the answer (Intro/Body/Conclusion):\n- Intro\n\nKey points to include:\n- p\n\nCommon examiner expectations:\n- e\n\n2 sample past-year style questions:\n1) q\n2) q";

    #[test]
    fn accepts_conforming_documents() {
        assert!(validate(Mode::Notes, NOTES_OK));
        assert!(validate(Mode::Mcq, MCQ_OK));
        assert!(validate(Mode::Pyq, PYQ_OK));
    }

    #[test]
    fn notes_require_diagram_section() {
        let text = NOTES_OK.replace("Diagram:", "Graph:");
        assert!(!validate(Mode::Notes, &text));
        assert_eq!(
            missing_requirements(Mode::Notes, &text),
            vec!["section \"diagram:\"".to_string()]
        );
    }

    #[test]
    fn notes_require_bullet_and_both_marker_styles() {
        let no_bullet = NOTES_OK.replace("- Inflation", "Inflation");
        assert!(!validate(Mode::Notes, &no_bullet));
        let no_paren = NOTES_OK.replace("3) Evaluate", "Evaluate");
        assert!(!validate(Mode::Notes, &no_paren));
    }

    #[test]
    fn sections_are_order_agnostic_and_case_insensitive() {
        let reordered = "EXAM QUESTIONS:\n1) a\n2) b\n3) c\nDIAGRAM:\nx\nCORE POINTS:\n1. a\n2. b\n3. c\nKEY TERMS:\n- t";
        assert!(validate(Mode::Notes, reordered));
    }

    #[test]
    fn mcq_requires_well_formed_answer_key() {
        let four_answers = MCQ_OK.replace(", 5-A", "");
        assert!(!validate(Mode::Mcq, &four_answers));
        let bad_letter = MCQ_OK.replace("3-C", "3-E");
        assert!(!validate(Mode::Mcq, &bad_letter));
        let spaced = MCQ_OK.replace("1-A, 2-b", "1 - A, 2-b");
        assert!(!validate(Mode::Mcq, &spaced));
    }

    #[test]
    fn mcq_requires_every_option_and_question_number() {
        let no_d = MCQ_OK.replace("d) z", "z");
        assert!(!validate(Mode::Mcq, &no_d));
        let no_five = MCQ_OK.replace("5. Q", "Q");
        assert!(!validate(Mode::Mcq, &no_five));
    }

    #[test]
    fn pyq_requires_literal_structure_heading() {
        let loose = PYQ_OK.replace(" (Intro/Body/Conclusion)", "");
        assert!(!validate(Mode::Pyq, &loose));
        let one_question = PYQ_OK.replace("2) q", "q");
        assert!(!validate(Mode::Pyq, &one_question));
    }

    #[test]
    fn empty_text_fails_every_mode() {
        for mode in Mode::ALL {
            assert!(!validate(mode, ""));
            assert!(!missing_requirements(mode, "").is_empty());
        }
    }
}
