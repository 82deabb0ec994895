//! Purpose: `ringpipe` CLI entry point and command dispatch.
//! Role: Binary crate root; hosts producer/consumer threads around a `BoundedPipe`.
//! Invariants: stdout carries only command payloads (piped bytes or a JSON report).
//! Invariants: Errors are emitted as JSON on stderr unless stderr is a terminal.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod pump;
mod stress;

use pump::{PumpConfig, run_pump};
use ringpipe::api::{Error, ErrorKind, to_exit_code};
use stress::{StressConfig, run_stress};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    init_tracing();
    dispatch(cli.command)
}

fn dispatch(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Pump {
            capacity,
            chunk,
            input,
            output,
            stats,
        } => {
            let config = PumpConfig {
                capacity,
                chunk,
                input,
                output,
            };
            let pipe_stats = run_pump(&config)?;
            if stats {
                let value = json!({ "stats": pipe_stats });
                eprintln!("{value}");
            }
            Ok(RunOutcome::ok())
        }
        Command::Stress {
            capacity,
            producers,
            consumers,
            bytes,
            chunk,
        } => {
            let config = StressConfig {
                capacity,
                producers,
                consumers,
                bytes,
                chunk,
            };
            let report = run_stress(config, env!("CARGO_PKG_VERSION"))?;
            let json = serde_json::to_string_pretty(&report).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode report")
                    .with_source(err)
            })?;
            println!("{json}");
            if report.ok {
                Ok(RunOutcome::ok())
            } else {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Internal)))
            }
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "ringpipe", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

#[derive(Parser)]
#[command(
    name = "ringpipe",
    version,
    about = "Move bytes between threads through a bounded, blocking ring pipe",
    after_help = r#"EXAMPLES
  $ cat big.log | ringpipe pump --capacity 64 > copy.log
  $ ringpipe stress --producers 4 --consumers 1 --bytes 100000

Set RUST_LOG=debug to trace pipe lifecycle events on stderr."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy input to output through a pipe (producer thread -> consumer)
    Pump {
        #[arg(long, default_value_t = 4096, help = "Pipe capacity in bytes")]
        capacity: usize,
        #[arg(long, default_value_t = 1024, help = "Bytes per write/read call")]
        chunk: usize,
        #[arg(long, help = "Read from this file instead of stdin", value_hint = ValueHint::FilePath)]
        input: Option<PathBuf>,
        #[arg(long, help = "Write to this file instead of stdout", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        #[arg(long, help = "Print pipe stats as JSON on stderr when done")]
        stats: bool,
    },
    /// Run concurrent producers and consumers against one pipe and verify delivery
    Stress {
        #[arg(long, default_value_t = 64, help = "Pipe capacity in bytes")]
        capacity: usize,
        #[arg(long, default_value_t = 4, help = "Producer threads (1-16)")]
        producers: usize,
        #[arg(long, default_value_t = 1, help = "Consumer threads")]
        consumers: usize,
        #[arg(long, default_value_t = 100_000, help = "Bytes written by each producer")]
        bytes: u64,
        #[arg(long, default_value_t = 32, help = "Bytes per write/read call")]
        chunk: usize,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Allocation => "allocation failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(capacity) = err.capacity() {
        inner.insert("capacity".to_string(), json!(capacity));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(capacity) = err.capacity() {
        lines.push(format!("capacity: {capacity}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}
