//! Purpose: Hold top-level CLI command dispatch for `deckstring`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `decode` writes the raw report bytes to stdout with no extra framing.

use std::io::{Read, Write};

use super::*;
use deckstring::api::Deck;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "deckstring", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Decode { deck } => {
            let raw = match deck.as_deref() {
                None | Some("-") => read_stdin_deck()?,
                Some(deck) => deck.as_bytes().to_vec(),
            };
            let report = Deck::new(raw).resolve()?;
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&report)
                .and_then(|()| stdout.flush())
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write report")
                        .with_source(err)
                })?;
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn read_stdin_deck() -> Result<Vec<u8>, Error> {
    let mut raw = Vec::new();
    io::stdin().read_to_end(&mut raw).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read deck from stdin")
            .with_source(err)
    })?;
    let len = raw.trim_ascii_end().len();
    raw.truncate(len);
    Ok(raw)
}
