//! Purpose: `deckstring` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits reports on stdout.
//! Invariants: `decode` prints the report bytes exactly as the server would serve them.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;
mod serve;

use deckstring::api::{Error, ErrorKind, to_exit_code};

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
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
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
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `deckstring --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_corrupt_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "deckstring",
    version,
    about = "Decode compressed deck strings into card reports",
    long_about = None,
    after_help = r#"EXAMPLES
  $ deckstring decode 'card|junk||0,1,1,0,2,0;;;&01;&1;x;;&02;&1;y;;&03;&1;z'
  card1 x3
  card2 x2
  card3 x1

  $ deckstring serve --deck-dir ./decks
  $ curl http://127.0.0.1:9710/deck/ironclad"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Decode one deck string and print its card report",
        long_about = r#"Decode a deck string and print one `<name> x<count>` line per card.

Reads the deck from the argument, or from stdin when the argument is
missing or `-`. Trailing whitespace on stdin is ignored."#,
        after_help = r#"EXAMPLES
  $ deckstring decode 'love|slay||0;;;&1 &0;x'
  $ deckstring decode < ironclad.deck"#
    )]
    Decode {
        #[arg(help = "Encoded deck string (default: stdin)")]
        deck: Option<String>,
    },
    #[command(
        about = "Serve decoded decks over HTTP",
        long_about = r#"Serve deck reports over HTTP.

Routes:
  GET    /healthz       liveness
  GET    /decks         registered deck names
  GET    /deck/<name>   text/plain card report
  PUT    /deck/<name>   register or replace a deck (raw body)
  DELETE /deck/<name>   forget a deck"#,
        after_help = r#"EXAMPLES
  $ deckstring serve
  $ deckstring serve --bind 127.0.0.1:9710 --deck-dir ./decks
  $ RUST_LOG=debug deckstring serve"#
    )]
    Serve(ServeArgs),
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ deckstring completion bash > ~/.local/share/bash-completion/completions/deckstring
  $ deckstring completion zsh > ~/.zfunc/_deckstring"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:9710", help = "Address to bind")]
    bind: String,
    #[arg(
        long,
        value_name = "DIR",
        help = "Register every *.deck file in DIR at startup",
        value_hint = ValueHint::DirPath
    )]
    deck_dir: Option<PathBuf>,
    #[arg(long, help = "Allow binding to a non-loopback address")]
    allow_non_loopback: bool,
    #[arg(long, default_value_t = 1024 * 1024, help = "Maximum PUT body size in bytes")]
    max_body_bytes: u64,
    #[arg(
        long,
        default_value_t = 5_000,
        help = "Maximum time to wait on another request's decode"
    )]
    decode_wait_ms: u64,
}

fn serve_config_from_args(args: ServeArgs) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:9710.")
    })?;
    Ok(serve::ServeConfig {
        bind,
        deck_dir: args.deck_dir,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
        decode_wait_ms: args.decode_wait_ms,
    })
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Corrupt && err.hint().is_none() {
        return err.with_hint("The deck string could not be decoded; re-export it from the source.");
    }
    err
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(deck) = err.deck() {
        lines.push(format!(
            "{} {deck}",
            colorize_label("deck:", use_color, AnsiColor::Yellow)
        ));
    }
    lines.join("\n")
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(deck) = err.deck() {
        inner.insert("deck".to_string(), json!(deck));
    }
    json!({ "error": Value::Object(inner) })
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
