//! Interactive shell.
//!
//! Each line is split like a shell command line and parsed by the same
//! [`Cli`] parser as a one-shot invocation. The session's startup flags are
//! applied first and the line's own flags override them, for that line only.
//! Every line gets a fresh pipeline. Errors are printed and the loop continues.

use std::ffi::OsString;

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, error};

use crate::cli::{self, build_pipeline, version_line, Cli, Command, GlobalOptions};

pub const PROMPT: &str = "specter> ";

/// What to do with one line of input.
#[derive(Debug)]
pub enum ReplAction {
    Empty,
    Exit,
    Run(Box<Cli>),
    Invalid(String),
}

/// Classifies one line of input against the session's startup flags.
#[must_use]
pub fn parse_line(line: &str, session: &GlobalOptions) -> ReplAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplAction::Empty;
    }
    if matches!(trimmed, "exit" | "quit") {
        return ReplAction::Exit;
    }
    let Some(tokens) = shlex::split(trimmed) else {
        return ReplAction::Invalid("unbalanced quotes".to_string());
    };

    let mut argv: Vec<OsString> = vec!["specter".into()];
    argv.extend(session.to_args());
    argv.extend(tokens.into_iter().map(OsString::from));
    match Cli::try_parse_from(argv) {
        Ok(Cli { command: None, .. }) => {
            ReplAction::Invalid("expected a command: search, monitor, or version".to_string())
        }
        Ok(Cli {
            command: Some(Command::Interactive),
            ..
        }) => ReplAction::Invalid("already in interactive mode".to_string()),
        Ok(cli) => ReplAction::Run(Box::new(cli)),
        Err(err) => ReplAction::Invalid(err.to_string()),
    }
}

/// Runs the shell until `exit`, `quit`, or end of input.
///
/// # Errors
///
/// Returns an error if the line editor cannot be set up, or if reading input
/// fails for a reason other than Ctrl-C or EOF.
pub async fn run(session: GlobalOptions) -> Result<()> {
    let mut editor = DefaultEditor::new()?;

    println!("{}", version_line());
    println!("Commands: search, monitor, version, help. Type `exit` to quit.");

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline(PROMPT)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        match parse_line(&line, &session) {
            ReplAction::Empty => {}
            ReplAction::Exit => break,
            ReplAction::Invalid(message) => eprintln!("{}", message.trim_end()),
            ReplAction::Run(cli) => {
                if let Err(err) = editor.add_history_entry(line.as_str()) {
                    debug!(error = %err, "history entry not recorded");
                }
                if let Err(err) = run_line(*cli).await {
                    error!(error = %err, "command failed");
                    eprintln!("Error: {err}");
                }
            }
        }
    }
    Ok(())
}

async fn run_line(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        return Ok(());
    };
    let mut pipeline = build_pipeline(cli.global.client_config(), std::io::stdout())?;
    cli::cancellable(cli::execute(&mut pipeline, command)).await
}
