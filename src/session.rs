//! Interactive read-process-respond loop.
//!
//! The session owns the mutable settings (mode, marks, topic) and the
//! backend. Settings change only between turns; each question is answered
//! with a snapshot of them.
use crate::audit::AuditSink;
use crate::backend::Backend;
use crate::config::{Config, Marks, Mode};
use crate::pipeline;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

pub const HELP_TEXT: &str = "Commands:
  help
  mode notes|mcq|pyq
  marks 2|5|10
  topic <text>
  model <model-id>
  exit

Slash commands:
  /notes <topic>
  /mcq <topic>
  /pyq <topic>

Anything else is answered in the current mode.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Empty,
    Help,
    Exit,
    SetMode(Mode),
    SetMarks(Marks),
    SetTopic(String),
    SetModel(String),
    Ask { mode: Option<Mode>, question: String },
    /// Input was recognized but unusable; the message explains why.
    Invalid(String),
}

/// Parse one line of user input.
pub fn parse_line(line: &str) -> SessionCommand {
    let line = line.trim();
    if line.is_empty() {
        return SessionCommand::Empty;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (name, arg) = split_command(rest);
        let Ok(mode) = name.parse::<Mode>() else {
            return SessionCommand::Invalid(format!("unknown slash command /{name}"));
        };
        if arg.is_empty() {
            return SessionCommand::Invalid("Please provide a topic/question.".to_string());
        }
        return SessionCommand::Ask {
            mode: Some(mode),
            question: arg.to_string(),
        };
    }

    let (command, arg) = split_command(line);
    match command.to_ascii_lowercase().as_str() {
        "help" | "?" => SessionCommand::Help,
        "exit" | "quit" => SessionCommand::Exit,
        "mode" => match arg.parse::<Mode>() {
            Ok(mode) => SessionCommand::SetMode(mode),
            Err(err) => SessionCommand::Invalid(err.to_string()),
        },
        "marks" => match arg.parse::<Marks>() {
            Ok(marks) => SessionCommand::SetMarks(marks),
            Err(err) => SessionCommand::Invalid(err.to_string()),
        },
        "topic" => SessionCommand::SetTopic(arg.to_string()),
        "model" if arg.is_empty() => SessionCommand::Invalid(
            "Provide a model name, e.g. model meta-llama/Llama-3.1-8B-Instruct".to_string(),
        ),
        "model" => SessionCommand::SetModel(arg.to_string()),
        _ => SessionCommand::Ask {
            mode: None,
            question: line.to_string(),
        },
    }
}

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    }
}

/// Interactive session state.
pub struct Session {
    pub config: Config,
    backend: Box<dyn Backend>,
    sink: Box<dyn AuditSink>,
}

impl Session {
    pub fn new(config: Config, backend: Box<dyn Backend>, sink: Box<dyn AuditSink>) -> Self {
        Self {
            config,
            backend,
            sink,
        }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// Answer one question with a snapshot of the current settings.
    pub fn ask(&mut self, question: &str) -> Result<pipeline::Outcome> {
        let config = self.config.clone();
        pipeline::run(self.backend.as_mut(), self.sink.as_mut(), question, &config)
    }

    /// Read commands until `exit` or end of input.
    pub fn run_loop<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(output, "Economics Explainer Bot")?;
        writeln!(output, "Model: {}", self.model_id())?;
        writeln!(output, "Type 'help' for commands.\n")?;

        let mut lines = input.lines();
        loop {
            write!(output, "You> ")?;
            output.flush()?;
            let Some(line) = lines.next() else {
                writeln!(output, "\nBye!")?;
                break;
            };
            let line = line.context("read input line")?;
            if !self.handle(parse_line(&line), output)? {
                break;
            }
        }
        Ok(())
    }

    /// Apply one command. Returns `false` when the session should end.
    fn handle<W: Write>(&mut self, command: SessionCommand, output: &mut W) -> Result<bool> {
        match command {
            SessionCommand::Empty => {}
            SessionCommand::Help => writeln!(output, "{HELP_TEXT}\n")?,
            SessionCommand::Exit => {
                writeln!(output, "Bye!")?;
                return Ok(false);
            }
            SessionCommand::SetMode(mode) => {
                self.config.mode = mode;
                writeln!(output, "mode set to: {mode}")?;
            }
            SessionCommand::SetMarks(marks) => {
                self.config.marks = marks;
                writeln!(output, "marks set to: {marks}")?;
            }
            SessionCommand::SetTopic(topic) => {
                self.config.topic = topic;
                writeln!(output, "topic set to: {}", self.config.topic)?;
            }
            SessionCommand::SetModel(model) => {
                self.backend.set_model(&model);
                writeln!(output, "model set to: {}", self.backend.model_id())?;
            }
            SessionCommand::Invalid(message) => writeln!(output, "{message}")?,
            SessionCommand::Ask { mode, question } => {
                if let Some(mode) = mode {
                    self.config.mode = mode;
                }
                match self.ask(&question) {
                    Ok(outcome) => writeln!(output, "\nBot> {}\n", outcome.final_text)?,
                    Err(err) => writeln!(output, "\n[Error] {err:#}\n")?,
                }
            }
        }
        Ok(true)
    }
}
