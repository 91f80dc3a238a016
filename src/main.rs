use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod audit;
mod backend;
mod config;
mod fallback;
mod pipeline;
mod prompts;
mod session;
mod text;
mod validate;

use config::{Config, EnvConfig, Marks, Mode};
use session::Session;

#[derive(Parser, Debug)]
#[command(
    name = "econ",
    version,
    about = "Economics exam answers in fixed note, MCQ, and past-paper templates"
)]
struct Cli {
    /// Model id (overrides HF_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Append a JSONL audit record per answer to this file (overrides ECON_BOT_LOG)
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,

    /// Local LM command that reads the prompt on stdin (overrides ECON_LM_COMMAND)
    #[arg(long, value_name = "CMD", global = true)]
    lm_command: Option<String>,

    /// Emit debug diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive session (default)
    Chat(ChatArgs),
    /// Answer a single question and exit
    Ask(AskArgs),
}

#[derive(Args, Debug, Default)]
struct ChatArgs {
    /// Starting mode
    #[arg(long, value_enum, default_value_t = Mode::Notes)]
    mode: Mode,
}

#[derive(Args, Debug)]
struct AskArgs {
    /// Output template
    #[arg(long, value_enum)]
    mode: Mode,

    /// Marks weighting: 2, 5, or 10
    #[arg(long, default_value = "5", value_parser = parse_marks)]
    marks: Marks,

    /// Topic-context line added to the prompt
    #[arg(long, default_value = "")]
    topic: String,

    /// Question or topic to answer
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut env = EnvConfig::from_env();
    if let Some(model) = &cli.model {
        env.hf_model = Some(model.clone());
    }
    if let Some(log) = &cli.log {
        env.audit_log = Some(log.clone());
    }
    if let Some(command) = &cli.lm_command {
        env.lm_command = Some(command.clone());
    }

    let backend = backend::from_env_config(&env)?;
    let sink = audit::sink_for(env.audit_log.clone());

    match cli.command.unwrap_or(Commands::Chat(ChatArgs::default())) {
        Commands::Chat(args) => cmd_chat(args, Session::new(Config::default(), backend, sink)),
        Commands::Ask(args) => cmd_ask(args, Session::new(Config::default(), backend, sink)),
    }
}

fn cmd_chat(args: ChatArgs, mut session: Session) -> Result<()> {
    session.config.mode = args.mode;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session.run_loop(stdin.lock(), &mut stdout)
}

fn cmd_ask(args: AskArgs, mut session: Session) -> Result<()> {
    session.config = Config {
        mode: args.mode,
        marks: args.marks,
        topic: args.topic,
    };
    let question = args.question.join(" ");
    let outcome = session.ask(&question)?;
    println!("{}", outcome.final_text);
    Ok(())
}

fn parse_marks(raw: &str) -> Result<Marks, String> {
    raw.parse::<Marks>().map_err(|err| err.to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("ECON_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
